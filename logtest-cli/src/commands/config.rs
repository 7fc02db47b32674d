//! `logtest config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logtest_analysis::Ruleset;
use logtest_core::config::LogtestConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Sections accepted by `config show --section`.
const SECTIONS: &[&str] = &["general", "logtest", "analysis", "metrics"];

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

/// Loads the configuration, then the ruleset it references.
///
/// # Errors
///
/// Returns `CliError::Config` if either step fails; the report is rendered first.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    let report = validate(config_path).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Builds the validation report for `config_path`.
pub async fn validate(config_path: &Path) -> ConfigValidationReport {
    info!(path = %config_path.display(), "validating configuration");

    let mut report = ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: false,
        errors: Vec::new(),
        ruleset: None,
    };

    let config = match LogtestConfig::load(config_path).await {
        Ok(config) => config,
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    };

    match Ruleset::load(&config.analysis).await {
        Ok(ruleset) => {
            report.ruleset = Some(RulesetCounts {
                decoders: ruleset.decoders.len(),
                rules: ruleset.rules.len(),
                lists: ruleset.lists.len(),
            });
            report.valid = true;
        }
        Err(e) => report.errors.push(e.to_string()),
    }
    report
}

/// Shows the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Core` if loading fails or `CliError::Command` for an unknown section.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = LogtestConfig::load(config_path).await?;
    let report = show(&config, config_path, section.as_deref())?;
    writer.render(&report)?;
    Ok(())
}

/// Serializes the whole configuration or one section of it.
pub fn show(
    config: &LogtestConfig,
    config_path: &Path,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let rendered = match section {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("logtest") => toml::to_string_pretty(&config.logtest),
        Some("analysis") => toml::to_string_pretty(&config.analysis),
        Some("metrics") => toml::to_string_pretty(&config.metrics),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: {})",
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(str::to_owned),
        config_toml: rendered.unwrap_or_else(|e| format!("(serialization error: {e})")),
    })
}

/// Configuration display report.
///
/// `config_toml` is text-only; JSON output omits it.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.section {
            Some(section) => writeln!(
                w,
                "Configuration {} (source: {})",
                format!("[{section}]").bold(),
                self.source
            )?,
            None => writeln!(w, "Configuration (source: {})", self.source.bold())?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)
    }
}

/// Counts of the loaded ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RulesetCounts {
    pub decoders: usize,
    pub rules: usize,
    pub lists: usize,
}

/// Configuration and ruleset validation report.
#[derive(Debug, Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ruleset: Option<RulesetCounts>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
        }
        if let Some(counts) = &self.ruleset {
            writeln!(
                w,
                "  Ruleset: {} decoders, {} rules, {} lists",
                counts.decoders, counts.rules, counts.lists
            )?;
        }
        for err in &self.errors {
            writeln!(w, "  Error: {}", err.red())?;
        }
        Ok(())
    }
}
