//! Runtime configuration: TOML file plus environment overrides.

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Top-level runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log threshold: a level name ("debug", "warning", ...) or a numeric
    /// threshold on the classic 100-600 scale.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// chrono format string used for the `{date}` and `{senddate}` template
    /// tokens.
    #[serde(default = "default_time_format")]
    pub time_format: String,
    /// When false the run is a dry run: replies are rendered and logged but
    /// never handed to the SMTP transport.
    #[serde(default = "default_true")]
    pub send_email: bool,
    /// Root against which relative rule template paths are resolved.
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
    /// Path to the rules file.
    #[serde(default = "default_rules_file")]
    pub rules_file: PathBuf,
    /// Flag written to each source message after its reply is dispatched.
    #[serde(default = "default_mark_as")]
    pub mark_as: String,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub incoming: IncomingConfig,
    pub outgoing: OutgoingConfig,
}

/// Incoming (IMAP) endpoint.
#[derive(Clone, Deserialize)]
pub struct IncomingConfig {
    /// Implicit TLS when true, STARTTLS otherwise.
    #[serde(default = "default_true")]
    pub secure: bool,
    pub host: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Outgoing (SMTP) endpoint.
#[derive(Clone, Deserialize)]
pub struct OutgoingConfig {
    pub host: String,
    #[serde(default = "default_true")]
    pub smtpauth: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// "ssl" (implicit TLS), "tls"/"starttls", or "none".
    #[serde(default = "default_smtpsecure")]
    pub smtpsecure: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
}

impl std::fmt::Debug for IncomingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingConfig")
            .field("secure", &self.secure)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for OutgoingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutgoingConfig")
            .field("host", &self.host)
            .field("smtpauth", &self.smtpauth)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("smtpsecure", &self.smtpsecure)
            .field("port", &self.port)
            .finish()
    }
}

impl Config {
    /// Load configuration from a TOML file, letting `AUTOREPLY_`-prefixed
    /// environment variables override file values.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("AUTOREPLY").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Tracing filter for the configured `log_level`.
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::new(level_directive(&self.log_level))
    }
}

/// Map a level name or numeric threshold onto a tracing directive.
///
/// Numeric values use the classic monolog scale (100 debug, 200 info,
/// 250 notice, 300 warning, 400+ error). Unknown input falls back to debug.
fn level_directive(raw: &str) -> &'static str {
    let raw = raw.trim();
    if let Ok(threshold) = raw.parse::<u32>() {
        return match threshold {
            0..=100 => "debug",
            101..=250 => "info",
            251..=300 => "warn",
            _ => "error",
        };
    }
    match raw.to_ascii_lowercase().as_str() {
        "trace" | "debug" => "debug",
        "info" | "notice" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" | "alert" | "emergency" => "error",
        _ => "debug",
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_time_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_true() -> bool {
    true
}

fn default_rules_file() -> PathBuf {
    PathBuf::from("rules.toml")
}

fn default_mark_as() -> String {
    "answered".to_string()
}

fn default_imap_port() -> u16 {
    993
}

fn default_smtpsecure() -> String {
    "tls".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

#[cfg(test)]
mod tests {
    use super::{Config, level_directive};
    use indoc::indoc;

    #[test]
    fn level_directive_maps_names_and_numbers() {
        assert_eq!(level_directive("debug"), "debug");
        assert_eq!(level_directive("NOTICE"), "info");
        assert_eq!(level_directive("warning"), "warn");
        assert_eq!(level_directive("EMERGENCY"), "error");
        assert_eq!(level_directive("100"), "debug");
        assert_eq!(level_directive("250"), "info");
        assert_eq!(level_directive("300"), "warn");
        assert_eq!(level_directive("400"), "error");
        assert_eq!(level_directive("nonsense"), "debug");
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = toml::from_str(indoc! {r#"
            [email.incoming]
            host = "mail.example.com"
            username = "bot"
            password = "secret"

            [email.outgoing]
            host = "smtp.example.com"
        "#})
        .expect("minimal config parses");

        assert_eq!(config.log_level, "info");
        assert_eq!(config.time_format, "%Y-%m-%d %H:%M:%S");
        assert!(config.send_email);
        assert_eq!(config.rules_file.to_str(), Some("rules.toml"));
        assert_eq!(config.mark_as, "answered");
        assert!(config.email.incoming.secure);
        assert_eq!(config.email.incoming.port, 993);
        assert_eq!(config.email.outgoing.smtpsecure, "tls");
        assert_eq!(config.email.outgoing.port, 587);
    }

    #[test]
    fn debug_output_redacts_passwords() {
        let config: Config = toml::from_str(indoc! {r#"
            [email.incoming]
            host = "mail.example.com"
            username = "bot"
            password = "hunter2"

            [email.outgoing]
            host = "smtp.example.com"
            password = "hunter2"
        "#})
        .expect("config parses");

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
