use anyhow::{Result, anyhow};
use config::{Config, File, FileFormat, Source};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub api: Api,
    pub auth: Auth,
    pub session: Session,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Api {
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub refresh_path: String,
    pub refresh_timeout_ms: u64,
    pub subscriber_wait_ms: u64,
    pub sign_in_page: String,
    pub refresh_token_placement: String, // "header" or "body"
    pub refresh_token_field: String,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub backend: String, // "memory" or "redis"
    pub redis_dsn: String,
    pub prefix: String,
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Load from a TOML file, defaulting to the profile's settings file.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    load(File::with_name(path.unwrap_or(SETTINGS_PATH)))
}

pub fn parse_settings_str(toml: &str) -> Result<Settings> {
    load(File::from_str(toml, FileFormat::Toml))
}

fn load<S>(source: S) -> Result<Settings>
where
    S: Source + Send + Sync + 'static,
{
    Config::builder()
        .add_source(source)
        .build()
        .and_then(|config| config.try_deserialize())
        .map_err(|e| anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV: &str = include_str!("../../settings/dev.toml");

    #[test]
    fn dev_settings_parse() {
        let settings = parse_settings_str(DEV).unwrap();
        assert_eq!(settings.auth.refresh_path, "/auth/refresh");
        assert_eq!(settings.auth.subscriber_wait_ms, 10_000);
        assert_eq!(settings.session.backend, "memory");
        assert_eq!(settings.session.ttl_secs, 7 * 24 * 60 * 60);
    }

    #[test]
    fn missing_section_is_an_error() {
        assert!(parse_settings_str("[log]\nfilter = \"info\"\n").is_err());
    }

    #[test]
    fn file_and_inline_sources_agree() {
        let from_file = parse_settings(Some("settings/dev.toml")).unwrap();
        let inline = parse_settings_str(DEV).unwrap();
        assert_eq!(from_file.api.base_url, inline.api.base_url);
        assert_eq!(from_file.log.filter, inline.log.filter);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }
}
