//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.comicbot/config.json`) and
//! environment. Page credentials are resolved once at startup into an
//! immutable [`PageCredentials`] value passed explicitly to the components
//! that need it; there are no ambient globals.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Messenger page settings (secret, tokens, public URL).
    #[serde(default)]
    pub page: PageConfig,

    /// Upstream API base URLs (overridable for tests).
    #[serde(default)]
    pub apis: ApisConfig,
}

/// Gateway bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the webhook HTTP server (default 5000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Messenger page settings. Each value can instead come from its environment
/// variable, which takes precedence over the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    /// App secret for webhook signature verification. Env: MESSENGER_APP_SECRET.
    pub app_secret: Option<String>,
    /// Token the platform echoes during webhook subscription. Env: MESSENGER_VALIDATION_TOKEN.
    pub validation_token: Option<String>,
    /// Page access token for the Send API. Env: MESSENGER_PAGE_ACCESS_TOKEN.
    pub page_access_token: Option<String>,
    /// Externally reachable base URL of this server (https). Env: SERVER_URL.
    pub server_url: Option<String>,
}

/// Upstream API base URLs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApisConfig {
    /// Graph API base (default https://graph.facebook.com/v2.6).
    pub graph_url: Option<String>,
    /// Comic content API base (default https://xkcd.com).
    pub comic_url: Option<String>,
}

/// Page credentials resolved from config + environment. Immutable after startup.
#[derive(Debug, Clone)]
pub struct PageCredentials {
    pub app_secret: String,
    pub validation_token: String,
    pub page_access_token: String,
    pub server_url: String,
}

fn env_or(config_value: Option<&str>, var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            config_value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve all required page credentials. Fails naming the first missing
/// value so startup can exit non-zero with a useful message.
pub fn resolve_credentials(config: &Config) -> Result<PageCredentials> {
    fn require(value: Option<String>, name: &str, var: &str) -> Result<String> {
        value.with_context(|| format!("missing {} (set {} or page.{} in config)", name, var, name))
    }
    Ok(PageCredentials {
        app_secret: require(
            env_or(config.page.app_secret.as_deref(), "MESSENGER_APP_SECRET"),
            "appSecret",
            "MESSENGER_APP_SECRET",
        )?,
        validation_token: require(
            env_or(
                config.page.validation_token.as_deref(),
                "MESSENGER_VALIDATION_TOKEN",
            ),
            "validationToken",
            "MESSENGER_VALIDATION_TOKEN",
        )?,
        page_access_token: require(
            env_or(
                config.page.page_access_token.as_deref(),
                "MESSENGER_PAGE_ACCESS_TOKEN",
            ),
            "pageAccessToken",
            "MESSENGER_PAGE_ACCESS_TOKEN",
        )?,
        server_url: require(
            env_or(config.page.server_url.as_deref(), "SERVER_URL"),
            "serverUrl",
            "SERVER_URL",
        )?,
    })
}

/// Resolve the gateway port: env PORT overrides config.
pub fn resolve_port(config: &Config) -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(config.gateway.port)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("COMICBOT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".comicbot").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or COMICBOT_CONFIG_PATH). Missing file => default config.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(default_config_path);
    if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        return Ok(Config::default());
    }
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parsing config from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 5000);
        assert_eq!(g.bind, "127.0.0.1");
    }

    #[test]
    fn resolve_credentials_reports_missing_value() {
        let config = Config::default();
        let err = resolve_credentials(&config).unwrap_err();
        assert!(err.to_string().contains("appSecret"), "got: {}", err);
    }

    #[test]
    fn resolve_credentials_from_file_values() {
        let mut config = Config::default();
        config.page.app_secret = Some("s3cret".into());
        config.page.validation_token = Some("verify".into());
        config.page.page_access_token = Some("token".into());
        config.page.server_url = Some("https://bot.example.com".into());
        let creds = resolve_credentials(&config).expect("all values present");
        assert_eq!(creds.app_secret, "s3cret");
        assert_eq!(creds.server_url, "https://bot.example.com");
    }

    #[test]
    fn blank_file_value_counts_as_missing() {
        let mut config = Config::default();
        config.page.app_secret = Some("  ".into());
        let err = resolve_credentials(&config).unwrap_err();
        assert!(err.to_string().contains("appSecret"));
    }
}
