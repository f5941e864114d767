use crate::builder::SessionPlan;
use crate::exporter::DEFAULT_REPORT_PREFIX;
use anyhow::Context;
use std::str::FromStr;
use tracing::warn;

pub const MIN_FONT_SIZE: u32 = 12;
pub const MAX_FONT_SIZE: u32 = 30;

pub fn clamp_font_size(size: i64) -> u32 {
    size.clamp(MIN_FONT_SIZE as i64, MAX_FONT_SIZE as i64) as u32
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub default_plan: SessionPlan,
    pub font_size: u32,
    pub report_prefix: String,
    pub max_upload_bytes: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            default_plan: SessionPlan { single: 5, multi: 2 },
            font_size: 20,
            report_prefix: DEFAULT_REPORT_PREFIX.into(),
            max_upload_bytes: 5 * 1024 * 1024,
            allowed_origins: vec!["http://localhost:5173".into()],
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = match get("QUIZ_HOST") {
            Some(h) => h,
            None => {
                warn!("QUIZ_HOST not set. Defaulting to {}", defaults.host);
                defaults.host.clone()
            }
        };
        let port = parse_or(&get, "QUIZ_PORT", defaults.port)?;
        let single = parse_or(&get, "QUIZ_DEFAULT_SINGLE", defaults.default_plan.single)?;
        let multi = parse_or(&get, "QUIZ_DEFAULT_MULTI", defaults.default_plan.multi)?;
        let font_size = clamp_font_size(parse_or(&get, "QUIZ_FONT_SIZE", defaults.font_size as i64)?);
        let max_upload_bytes = parse_or(&get, "QUIZ_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?;
        let report_prefix = get("QUIZ_REPORT_PREFIX").unwrap_or(defaults.report_prefix);
        let allowed_origins = match get("QUIZ_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            None => defaults.allowed_origins,
        };

        Ok(Self {
            host,
            port,
            default_plan: SessionPlan { single, multi },
            font_size,
            report_prefix,
            max_upload_bytes,
            allowed_origins,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + std::fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be valid, got {raw:?}")),
        None => {
            warn!("{key} not set. Defaulting to {default}");
            Ok(default)
        }
    }
}
