pub mod bank;
pub mod builder;
pub mod config;
pub mod error;
pub mod exporter;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod scorer;
pub mod session;
pub mod state;

pub fn build_state(config: config::AppConfig) -> anyhow::Result<state::AppState> {
    let loader = bank::BankLoader::bundled()?;
    Ok(state::AppState::new(config, loader))
}
