//! `logpost config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logpost_core::config::LogpostConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Execute the config validate subcommand.
///
/// Attempts to load and validate the configuration file, reporting any errors.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails (missing fields, invalid
/// values, parse errors).
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let result = LogpostConfig::load(config_path).await;

    let report = match result {
        Ok(_) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Execute the config show subcommand.
///
/// Loads and displays the effective configuration (file + env overrides +
/// defaults). The broker password is redacted before rendering.
///
/// # Errors
///
/// Returns `CliError::Core` if loading fails or `CliError::Command` if the
/// section name is unknown.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let mut config = LogpostConfig::load(config_path).await?;
    redact_credentials(&mut config);

    let report = build_show_report(&config, config_path, section)?;

    writer.render(&report)?;

    Ok(())
}

fn build_show_report(
    config: &LogpostConfig,
    config_path: &Path,
    section: Option<String>,
) -> Result<ConfigReport, CliError> {
    let source = config_path.display().to_string();

    let report = match section.as_deref() {
        None => ConfigReport {
            source,
            section: None,
            config_toml: render_toml(config),
        },
        Some("general") => ConfigReport {
            source,
            section: Some("general".to_owned()),
            config_toml: render_toml(&config.general),
        },
        Some("tail") => ConfigReport {
            source,
            section: Some("tail".to_owned()),
            config_toml: render_toml(&config.tail),
        },
        Some("broker") => ConfigReport {
            source,
            section: Some("broker".to_owned()),
            config_toml: render_toml(&config.broker),
        },
        Some("metrics") => ConfigReport {
            source,
            section: Some("metrics".to_owned()),
            config_toml: render_toml(&config.metrics),
        },
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: general, tail, broker, metrics)",
                other
            )));
        }
    };

    Ok(report)
}

fn render_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {})", e))
}

/// Replace the broker password so `config show` never leaks credentials.
fn redact_credentials(config: &mut LogpostConfig) {
    if !config.broker.password.is_empty() {
        config.broker.password = "***REDACTED***".to_owned();
    }
}

/// Configuration display report.
///
/// The `config_toml` field is skipped during JSON serialization; the JSON
/// view carries only the source path and section, since the caller can use
/// `--format json` on other commands or read the TOML file directly.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration (with redacted credentials)
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_config_report_render_text_full_config() {
        let report = ConfigReport {
            source: "logpost.toml".to_owned(),
            section: None,
            config_toml: "[general]\nlog_level = \"info\"".to_owned(),
        };

        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("Configuration"), "should contain header");
        assert!(
            output.contains("logpost.toml"),
            "should contain source filename"
        );
        assert!(
            output.contains("log_level"),
            "should contain config content"
        );
    }

    #[test]
    fn test_config_report_render_text_specific_section() {
        let report = ConfigReport {
            source: "/etc/logpost/logpost.toml".to_owned(),
            section: Some("broker".to_owned()),
            config_toml: "host = \"localhost\"".to_owned(),
        };

        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("[broker]"), "should show section name");
        assert!(output.contains("host"), "should show config content");
    }

    #[test]
    fn test_config_report_json_skips_toml_body() {
        let report = ConfigReport {
            source: "logpost.toml".to_owned(),
            section: Some("tail".to_owned()),
            config_toml: "enabled = true".to_owned(),
        };

        let json = serde_json::to_string(&report).expect("JSON serialization should succeed");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("should parse JSON");

        assert_eq!(parsed["source"].as_str(), Some("logpost.toml"));
        assert_eq!(parsed["section"].as_str(), Some("tail"));
        assert!(
            parsed.get("config_toml").is_none(),
            "config_toml should be skipped"
        );
    }

    #[test]
    fn test_build_show_report_full_renders_all_sections() {
        let config = LogpostConfig::default();
        let report = build_show_report(&config, &PathBuf::from("logpost.toml"), None)
            .expect("full report should build");

        assert!(report.section.is_none());
        assert!(report.config_toml.contains("[general]"));
        assert!(report.config_toml.contains("[tail]"));
        assert!(report.config_toml.contains("[broker]"));
        assert!(report.config_toml.contains("[metrics]"));
    }

    #[test]
    fn test_build_show_report_single_section() {
        let config = LogpostConfig::default();
        let report = build_show_report(
            &config,
            &PathBuf::from("logpost.toml"),
            Some("broker".to_owned()),
        )
        .expect("section report should build");

        assert_eq!(report.section.as_deref(), Some("broker"));
        assert!(report.config_toml.contains("host"));
        assert!(
            !report.config_toml.contains("filter_file"),
            "tail fields should not leak into the broker section"
        );
    }

    #[test]
    fn test_build_show_report_unknown_section_fails() {
        let config = LogpostConfig::default();
        let result = build_show_report(
            &config,
            &PathBuf::from("logpost.toml"),
            Some("storage".to_owned()),
        );

        let err = result.expect_err("unknown section should fail");
        assert!(err.to_string().contains("unknown section"));
        assert!(
            err.to_string().contains("general, tail, broker, metrics"),
            "error should list known sections"
        );
    }

    #[test]
    fn test_redact_credentials_replaces_password() {
        let mut config = LogpostConfig::default();
        config.broker.password = "s3cret".to_owned();

        redact_credentials(&mut config);

        assert_eq!(config.broker.password, "***REDACTED***");
        assert_eq!(
            config.broker.username, "guest",
            "username should be untouched"
        );
    }

    #[test]
    fn test_redact_credentials_leaves_empty_password() {
        let mut config = LogpostConfig::default();
        config.broker.password = String::new();

        redact_credentials(&mut config);

        assert!(config.broker.password.is_empty());
    }

    #[test]
    fn test_config_validation_report_valid() {
        let report = ConfigValidationReport {
            source: "logpost.toml".to_owned(),
            valid: true,
            errors: Vec::new(),
        };

        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("VALID"), "should show valid status");
        assert!(!output.contains("Error:"), "should not show errors");
    }

    #[test]
    fn test_config_validation_report_invalid_with_errors() {
        let report = ConfigValidationReport {
            source: "bad.toml".to_owned(),
            valid: false,
            errors: vec![
                "invalid config value for 'general.log_level': must be one of trace, debug, info, warn, error".to_owned(),
            ],
        };

        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("INVALID"), "should show invalid status");
        assert!(
            output.contains("general.log_level"),
            "should show error message"
        );
    }

    #[test]
    fn test_config_validation_report_json_shape() {
        let report = ConfigValidationReport {
            source: "bad.toml".to_owned(),
            valid: false,
            errors: vec!["error message".to_owned()],
        };

        let json = serde_json::to_string(&report).expect("JSON serialization should succeed");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("should parse JSON");

        assert_eq!(parsed["valid"].as_bool(), Some(false));
        assert_eq!(
            parsed["errors"].as_array().expect("should be array").len(),
            1
        );
    }
}
