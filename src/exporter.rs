use crate::error::QuizError;
use crate::models::MissedQuestion;
use chrono::{DateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_REPORT_PREFIX: &str = "missed_questions";

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("static pattern"));

pub fn export_missed(missed: &[MissedQuestion]) -> Result<Vec<u8>, QuizError> {
    Ok(serde_json::to_vec_pretty(missed)?)
}

/// `<prefix>_<YYYYMMDD_HHMMSS>.json`, safe to put in a header.
pub fn report_filename<Tz: TimeZone>(prefix: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}.json", sanitize_prefix(prefix), at.format("%Y%m%d_%H%M%S"))
}

pub fn sanitize_prefix(prefix: &str) -> String {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(prefix.trim(), "_");
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        DEFAULT_REPORT_PREFIX.to_string()
    } else {
        cleaned.to_string()
    }
}
