use crate::cli::Cli;
use anyhow::bail;
use log::LevelFilter;
use sportmonks_api::ApiConfig;
use std::path::PathBuf;

pub const ENV_FILE_VAR: &str = "SPORTMONKS_ENV_FILE";

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub api: ApiConfig,
    pub log_level: Option<LevelFilter>,
}

impl AppSettings {
    /// Load `.env` into the process environment so clap's env fallbacks see it.
    /// `SPORTMONKS_ENV_FILE` points at an explicit file; otherwise the current
    /// directory and its parents are searched.
    pub fn load_env_file() -> Option<PathBuf> {
        match std::env::var_os(ENV_FILE_VAR) {
            Some(path) => {
                let path = PathBuf::from(path);
                dotenv::from_path(&path).ok().map(|_| path)
            }
            None => dotenv::dotenv().ok(),
        }
    }

    /// Environment defaults overridden by command line flags.
    pub fn from_cli(cli: &Cli) -> Self {
        Self::merge(ApiConfig::from_env(), cli)
    }

    fn merge(mut api: ApiConfig, cli: &Cli) -> Self {
        if let Some(key) = cli.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            api.api_token = Some(key.trim().to_owned());
        }
        if let Some(base_url) = cli.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            api.base_url = base_url.trim().to_owned();
        }
        Self { api, log_level: cli.log_level }
    }

    pub fn require_token(&self) -> anyhow::Result<()> {
        if self.api.api_token.is_none() {
            bail!("SPORTMONKS_API_KEY is not set; export it or pass --api-key");
        }
        Ok(())
    }

    /// `--log-level` wins over `RUST_LOG`, which wins over `info`.
    pub fn log_directive(&self) -> String {
        match self.log_level {
            Some(level) => level.as_str().to_ascii_lowercase(),
            None => std::env::var("RUST_LOG")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "info".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use sportmonks_api::client::DEFAULT_BASE_URL;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn flags_override_environment() {
        let cli = cli(&["smx", "--api-key", " abc ", "--base-url", "http://localhost:9", "diagnose"]);
        let settings = AppSettings::merge(ApiConfig::default(), &cli);

        assert_eq!(settings.api.api_token.as_deref(), Some("abc"));
        assert_eq!(settings.api.base_url, "http://localhost:9");
        assert!(settings.require_token().is_ok());
    }

    #[test]
    fn blank_flags_keep_defaults() {
        let cli = cli(&["smx", "--api-key", "", "--base-url", " ", "diagnose"]);
        let settings = AppSettings::merge(ApiConfig::default(), &cli);

        assert_eq!(settings.api.base_url, DEFAULT_BASE_URL);
        assert!(settings.require_token().is_err());
    }

    #[test]
    fn explicit_log_level_wins() {
        let cli = cli(&["smx", "--log-level", "WARN", "diagnose"]);
        let settings = AppSettings::merge(ApiConfig::default(), &cli);
        assert_eq!(settings.log_directive(), "warn");
    }
}
