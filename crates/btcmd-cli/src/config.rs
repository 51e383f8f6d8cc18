//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use btcmd_core::{CommandPayload, SessionConfig};
use serde::{Deserialize, Serialize};

use crate::cli::{ConfigKey, OutputFormat, SessionArgs};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default command text
    #[serde(default)]
    pub payload: Option<String>,

    /// Interpret the payload as hex bytes
    #[serde(default)]
    pub hex: bool,

    /// Scan window in seconds
    #[serde(default)]
    pub scan_timeout: Option<u64>,

    /// Connect timeout in seconds
    #[serde(default)]
    pub connect_timeout: Option<u64>,

    /// Timeout for each discovery, write and read in seconds
    #[serde(default)]
    pub operation_timeout: Option<u64>,

    /// Default output format
    #[serde(default)]
    pub format: Option<String>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("btcmd")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from a specific file, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Current value of a key, if set.
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::Payload => self.payload.clone(),
            ConfigKey::Hex => Some(self.hex.to_string()),
            ConfigKey::ScanTimeout => self.scan_timeout.map(|v| v.to_string()),
            ConfigKey::ConnectTimeout => self.connect_timeout.map(|v| v.to_string()),
            ConfigKey::OperationTimeout => self.operation_timeout.map(|v| v.to_string()),
            ConfigKey::Format => self.format.clone(),
            ConfigKey::NoColor => Some(self.no_color.to_string()),
        }
    }

    /// Set a key from its text form.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        match key {
            ConfigKey::Payload => self.payload = Some(value.to_string()),
            ConfigKey::Hex => self.hex = parse_bool(value)?,
            ConfigKey::ScanTimeout => self.scan_timeout = Some(parse_secs(value)?),
            ConfigKey::ConnectTimeout => self.connect_timeout = Some(parse_secs(value)?),
            ConfigKey::OperationTimeout => self.operation_timeout = Some(parse_secs(value)?),
            ConfigKey::Format => {
                if OutputFormat::from_config(value).is_none() {
                    bail!("Invalid format '{}'. Use 'text' or 'json'", value);
                }
                self.format = Some(value.to_lowercase());
            }
            ConfigKey::NoColor => self.no_color = parse_bool(value)?,
        }
        Ok(())
    }

    /// Reset a key to its default.
    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::Payload => self.payload = None,
            ConfigKey::Hex => self.hex = false,
            ConfigKey::ScanTimeout => self.scan_timeout = None,
            ConfigKey::ConnectTimeout => self.connect_timeout = None,
            ConfigKey::OperationTimeout => self.operation_timeout = None,
            ConfigKey::Format => self.format = None,
            ConfigKey::NoColor => self.no_color = false,
        }
    }

    /// Output format from the command line, then the config file, then text.
    pub fn resolve_format(&self, arg: Option<OutputFormat>) -> OutputFormat {
        arg.or_else(|| self.format.as_deref().and_then(OutputFormat::from_config))
            .unwrap_or_default()
    }

    /// Build a session configuration, command-line arguments first.
    pub fn session_config(&self, args: &SessionArgs) -> Result<SessionConfig> {
        let mut config = SessionConfig::default();

        // The file's hex flag describes the file's payload only.
        let payload = match (&args.payload, &self.payload) {
            (Some(text), _) => Some((text, args.hex)),
            (None, Some(text)) => Some((text, args.hex || self.hex)),
            (None, None) => None,
        };
        if let Some((text, hex)) = payload {
            config = config.payload(parse_payload(text, hex)?);
        }
        if let Some(secs) = args.scan_timeout.or(self.scan_timeout) {
            config = config.scan_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = args.connect_timeout.or(self.connect_timeout) {
            config = config.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = args.operation_timeout.or(self.operation_timeout) {
            let timeout = Duration::from_secs(secs);
            config = config
                .discovery_timeout(timeout)
                .write_timeout(timeout)
                .read_timeout(timeout);
        }

        config.validate().context("Invalid session settings")?;
        Ok(config)
    }
}

/// Parse a command payload as text or hex.
pub fn parse_payload(text: &str, hex: bool) -> Result<CommandPayload> {
    if hex {
        CommandPayload::from_hex(text).with_context(|| format!("Invalid hex payload '{}'", text))
    } else {
        Ok(CommandPayload::from_text(text))
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => bail!("Invalid boolean '{}'. Use true or false", value),
    }
}

fn parse_secs(value: &str) -> Result<u64> {
    let secs: u64 = value
        .parse()
        .with_context(|| format!("Invalid number of seconds '{}'", value))?;
    if secs == 0 {
        bail!("Timeout must be at least 1 second");
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SessionArgs {
        SessionArgs {
            payload: None,
            hex: false,
            scan_timeout: None,
            connect_timeout: None,
            operation_timeout: None,
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.payload.is_none());
        assert!(!config.hex);
        assert!(config.scan_timeout.is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set(ConfigKey::Payload, "status").unwrap();
        config.set(ConfigKey::ScanTimeout, "12").unwrap();
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_load_invalid_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "scan_timeout = \"soon\"").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set(ConfigKey::ScanTimeout, "0").is_err());
        assert!(config.set(ConfigKey::ScanTimeout, "abc").is_err());
        assert!(config.set(ConfigKey::Hex, "maybe").is_err());
        assert!(config.set(ConfigKey::Format, "csv").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_unset_restores_default() {
        let mut config = Config::default();
        config.set(ConfigKey::NoColor, "yes").unwrap();
        config.set(ConfigKey::Format, "JSON").unwrap();
        assert_eq!(config.get(ConfigKey::Format).as_deref(), Some("json"));

        config.unset(ConfigKey::NoColor);
        config.unset(ConfigKey::Format);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_resolve_format_prefers_argument() {
        let config = Config {
            format: Some("json".to_string()),
            ..Config::default()
        };
        assert_eq!(config.resolve_format(None), OutputFormat::Json);
        assert_eq!(
            config.resolve_format(Some(OutputFormat::Text)),
            OutputFormat::Text
        );
        assert_eq!(Config::default().resolve_format(None), OutputFormat::Text);
    }

    #[test]
    fn test_session_config_defaults() {
        let session = Config::default().session_config(&args()).unwrap();
        assert_eq!(session.payload, CommandPayload::default());
        assert!(session.auto_start_on_ready);
    }

    #[test]
    fn test_session_config_arguments_override_file() {
        let config = Config {
            payload: Some("from-file".to_string()),
            scan_timeout: Some(30),
            ..Config::default()
        };
        let mut args = args();
        args.payload = Some("0a0b".to_string());
        args.hex = true;
        args.operation_timeout = Some(3);

        let session = config.session_config(&args).unwrap();
        assert_eq!(session.payload.as_bytes(), &[0x0a, 0x0b]);
        assert_eq!(session.scan_timeout, Duration::from_secs(30));
        assert_eq!(session.read_timeout, Duration::from_secs(3));
        assert_eq!(session.write_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_file_hex_flag_does_not_apply_to_argument_payload() {
        let config = Config {
            payload: Some("0102".to_string()),
            hex: true,
            ..Config::default()
        };
        let session = config.session_config(&args()).unwrap();
        assert_eq!(session.payload.as_bytes(), &[0x01, 0x02]);

        let mut text_args = args();
        text_args.payload = Some("hello".to_string());
        let session = config.session_config(&text_args).unwrap();
        assert_eq!(session.payload.as_bytes(), b"hello");
    }

    #[test]
    fn test_session_config_rejects_empty_payload() {
        let mut args = args();
        args.payload = Some(String::new());
        assert!(Config::default().session_config(&args).is_err());
    }

    #[test]
    fn test_parse_payload_hex_error() {
        assert!(parse_payload("abc", true).is_err());
        assert_eq!(parse_payload("hi", false).unwrap().as_bytes(), b"hi");
    }
}
