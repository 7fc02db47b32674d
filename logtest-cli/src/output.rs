//! Output formatting abstraction for text vs JSON rendering
//!
//! All subcommand output flows through [`OutputWriter`], so command handlers
//! never branch on the output format themselves.

use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use serde_json::{Map, Value};

use logtest_core::protocol::Response;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Indentation used for the phase detail lines.
const DETAIL_INDENT: &str = "       ";

/// Writes CLI payloads in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(&mut handle, payload)
    }

    /// Render a payload to `w`.
    ///
    /// Text goes through [`Render::render_text`]; JSON is written as one
    /// compact document per line so that streamed `send` results stay
    /// line-delimited.
    pub fn render_to<T: Render + Serialize>(
        &self,
        w: &mut dyn Write,
        payload: &T,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Human-readable text rendering.
///
/// Implemented by every CLI output payload alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

impl Render for Response {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if let Some(token) = &self.token {
            writeln!(w, "Session: {}", token.bold())?;
        }
        for message in &self.messages {
            writeln!(w, "{}", colorize_message(message))?;
        }

        let Some(Value::Object(output)) = &self.output else {
            return Ok(());
        };

        if !self.messages.is_empty() || self.token.is_some() {
            writeln!(w)?;
        }
        render_predecoding(w, output)?;
        render_decoding(w, output)?;
        render_filtering(w, output)?;

        if self.alert == Some(true) {
            writeln!(w, "{}", "**Alert to be generated.".red().bold())?;
        }
        Ok(())
    }
}

fn colorize_message(message: &str) -> String {
    if message.starts_with("ERROR") {
        message.red().to_string()
    } else if message.starts_with("WARNING") {
        message.yellow().to_string()
    } else {
        message.cyan().to_string()
    }
}

fn render_predecoding(w: &mut dyn Write, output: &Map<String, Value>) -> std::io::Result<()> {
    writeln!(w, "{}", "**Phase 1: Completed pre-decoding.".bold())?;
    if let Some(full_log) = output.get("full_log") {
        write_detail(w, "full event", full_log)?;
    }
    if let Some(Value::Object(predecoder)) = output.get("predecoder") {
        for key in ["timestamp", "hostname", "program_name"] {
            if let Some(value) = predecoder.get(key) {
                write_detail(w, key, value)?;
            }
        }
    }
    writeln!(w)
}

fn render_decoding(w: &mut dyn Write, output: &Map<String, Value>) -> std::io::Result<()> {
    let Some(Value::Object(decoder)) = output.get("decoder") else {
        writeln!(w, "{}", "**Phase 2: No decoder matched.".bold())?;
        return writeln!(w);
    };

    writeln!(w, "{}", "**Phase 2: Completed decoding.".bold())?;
    if let Some(name) = decoder.get("name") {
        write_detail(w, "name", name)?;
    }
    if let Some(parent) = decoder.get("parent") {
        write_detail(w, "parent", parent)?;
    }
    if let Some(Value::Object(data)) = output.get("data") {
        let mut fields = Vec::new();
        flatten_fields("", data, &mut fields);
        for (key, value) in fields {
            write_detail(w, &key, value)?;
        }
    }
    writeln!(w)
}

fn render_filtering(w: &mut dyn Write, output: &Map<String, Value>) -> std::io::Result<()> {
    let Some(Value::Object(rule)) = output.get("rule") else {
        return Ok(());
    };

    writeln!(w, "{}", "**Phase 3: Completed filtering (rules).".bold())?;
    for key in ["id", "level", "description", "groups", "firedtimes", "frequency"] {
        if let Some(value) = rule.get(key) {
            write_detail(w, key, value)?;
        }
    }
    if let Some(previous) = output.get("previous_output") {
        write_detail(w, "previous_output", previous)?;
    }
    Ok(())
}

fn write_detail(w: &mut dyn Write, key: &str, value: &Value) -> std::io::Result<()> {
    match value {
        Value::String(s) => writeln!(w, "{DETAIL_INDENT}{key}: '{s}'"),
        other => writeln!(w, "{DETAIL_INDENT}{key}: '{other}'"),
    }
}

/// Collects leaf values of nested `data` objects under dotted keys.
fn flatten_fields<'a>(prefix: &str, map: &'a Map<String, Value>, out: &mut Vec<(String, &'a Value)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => flatten_fields(&path, inner, out),
            leaf => out.push((path, leaf)),
        }
    }
}
