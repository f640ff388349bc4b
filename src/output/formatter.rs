//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::error::{AppError, Result};
use crate::models::{EnvironmentConfig, EnvironmentRunResult, ProbeResult, ProtocolSummary, RunSummary};
use crate::stats::Report;
use crate::types::Protocol;
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Progress line printed before an environment's probes start
    fn format_environment_start(&self, environment: &EnvironmentConfig) -> Result<String>;

    /// Both probe results of one finished environment
    fn format_environment_result(&self, result: &EnvironmentRunResult) -> Result<String>;

    /// Per-protocol summary of the whole run
    fn format_summary(&self, summary: &RunSummary) -> Result<String>;

    /// The recommended strategy with its rationale
    fn format_recommendation(&self, report: &Report) -> Result<String>;

    /// Per-environment verdict table
    fn format_environment_analysis(&self, report: &Report) -> Result<String>;

    fn format_error(&self, error: &str) -> Result<String>;

    fn format_warning(&self, warning: &str) -> Result<String>;

    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub enable_color: bool,
    /// Also list every recorded error string
    pub verbose_mode: bool,
    pub table_borders: bool,
    /// Maximum width of a single table column
    pub max_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            max_width: 60,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    pub columns: Vec<Column>,
    pub show_borders: bool,
    pub show_header: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width: 0,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Render rows as a text table
pub fn render_table(format: &TableFormat, rows: &[RowData]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let widths = column_widths(format, rows);
    let mut output = String::new();

    if format.show_header && !format.columns.is_empty() {
        if format.show_borders {
            output.push_str(&horizontal_border(&widths));
            output.push('\n');
        }

        let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
        output.push_str(&render_row(&headers, &widths, format));
        output.push('\n');

        if format.show_borders {
            output.push_str(&horizontal_border(&widths));
            output.push('\n');
        }
    }

    for row in rows {
        output.push_str(&render_row(row, &widths, format));
        output.push('\n');
    }

    if format.show_borders {
        output.push_str(&horizontal_border(&widths));
    }

    output.trim_end().to_string()
}

fn column_widths(format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
    let num_columns = format.columns.len().max(rows.iter().map(|r| r.len()).max().unwrap_or(0));

    (0..num_columns)
        .map(|idx| {
            let column = format.columns.get(idx);
            let mut width = column.map(|c| c.min_width.max(text_width(&c.header))).unwrap_or(0);

            for row in rows {
                if let Some(cell) = row.get(idx) {
                    width = width.max(text_width(cell));
                }
            }

            match column {
                Some(c) => width.min(c.max_width),
                None => width,
            }
        })
        .collect()
}

fn render_row(data: &[String], widths: &[usize], format: &TableFormat) -> String {
    let mut row = String::new();

    if format.show_borders {
        row.push('|');
    }

    for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
        let alignment = format.columns.get(idx).map(|c| &c.alignment).unwrap_or(&Alignment::Left);
        let padded = align_text(cell, width, alignment);

        if format.show_borders {
            row.push(' ');
            row.push_str(&padded);
            row.push_str(" |");
        } else {
            row.push_str(&padded);
            row.push_str("  ");
        }
    }

    row.trim_end().to_string()
}

fn horizontal_border(widths: &[usize]) -> String {
    let mut border = String::new();

    if !widths.is_empty() {
        border.push('+');
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
    }

    border
}

/// Display width in characters
fn text_width(text: &str) -> usize {
    text.chars().count()
}

fn align_text(text: &str, width: usize, alignment: &Alignment) -> String {
    let len = text_width(text);
    if len >= width {
        return text.chars().take(width).collect();
    }

    let padding = width - len;
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            let right_pad = padding - left_pad;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
        }
    }
}

/// Milliseconds with two decimals, or `N/A`
pub fn format_ms(value: Option<f64>) -> String {
    match value {
        Some(ms) => format!("{:.2}ms", ms),
        None => "N/A".to_string(),
    }
}

/// Percentage with one decimal
pub fn format_percentage(percentage: f64) -> String {
    format!("{:.1}%", percentage)
}

pub(crate) fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::internal(format!("Failed to format output: {}", e))
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub(crate) fn analysis_table_format(&self) -> TableFormat {
        TableFormat {
            columns: vec![
                Column::new("Environment", Alignment::Left, self.options.max_width),
                Column::new("WebSocket", Alignment::Center, 10),
                Column::new("SSE", Alignment::Center, 10),
                Column::new("Verdict", Alignment::Left, self.options.max_width),
            ],
            show_borders: self.options.table_borders,
            show_header: true,
        }
    }

    fn format_probe(&self, output: &mut String, protocol: Protocol, probe: &ProbeResult) -> Result<()> {
        writeln!(output, "    {}:", protocol).map_err(fmt_err)?;
        writeln!(output, "      Connected:       {}", yes_no(probe.connection_success)).map_err(fmt_err)?;
        writeln!(output, "      Connection time: {}", format_ms(probe.connection_time_ms)).map_err(fmt_err)?;
        writeln!(output, "      Mean latency:    {}", format_ms(probe.mean_latency_ms())).map_err(fmt_err)?;
        writeln!(output, "      Reconnected:     {}", yes_no(probe.reconnect_success)).map_err(fmt_err)?;
        writeln!(output, "      Errors:          {}", probe.error_count()).map_err(fmt_err)?;

        if self.options.verbose_mode {
            for error in &probe.errors {
                writeln!(output, "        - {}", error).map_err(fmt_err)?;
            }
        }
        Ok(())
    }

    fn format_protocol_summary(&self, output: &mut String, protocol: Protocol, summary: &ProtocolSummary) -> Result<()> {
        writeln!(output, "{} overall:", protocol).map_err(fmt_err)?;
        writeln!(
            output,
            "  Success rate:   {} ({}/{})",
            format_percentage(summary.success_rate_percent()),
            summary.success_count,
            summary.total_count
        )
        .map_err(fmt_err)?;
        writeln!(output, "  Mean latency:   {:.2}ms", summary.mean_latency_ms).map_err(fmt_err)?;
        writeln!(output, "  Reconnect rate: {}", format_percentage(summary.reconnect_rate_percent)).map_err(fmt_err)?;
        Ok(())
    }
}

pub(crate) fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Rows of the per-environment verdict table
pub(crate) fn analysis_rows(report: &Report, mark: impl Fn(bool) -> String) -> Vec<RowData> {
    report
        .environments
        .iter()
        .map(|env| {
            let (ws, sse) = match env.outcome {
                crate::types::EnvironmentOutcome::BothOk => (true, true),
                crate::types::EnvironmentOutcome::WebSocketOnly => (true, false),
                crate::types::EnvironmentOutcome::SseOnly => (false, true),
                crate::types::EnvironmentOutcome::NeitherOk => (false, false),
            };
            vec![env.description.clone(), mark(ws), mark(sse), env.annotation().to_string()]
        })
        .collect()
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(text_width(title) + 4);

        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_environment_start(&self, environment: &EnvironmentConfig) -> Result<String> {
        let mut output = format!("Testing environment: {}", environment.description);
        if let Some(proxy) = &environment.proxy {
            write!(output, " (via {})", proxy).map_err(fmt_err)?;
        }
        Ok(output)
    }

    fn format_environment_result(&self, result: &EnvironmentRunResult) -> Result<String> {
        let mut output = String::new();
        writeln!(output, "  Results - {}:", result.name.to_uppercase()).map_err(fmt_err)?;
        self.format_probe(&mut output, Protocol::WebSocket, &result.web_socket)?;
        self.format_probe(&mut output, Protocol::Sse, &result.sse)?;
        Ok(output.trim_end().to_string())
    }

    fn format_summary(&self, summary: &RunSummary) -> Result<String> {
        let mut output = String::new();
        writeln!(output, "{}", self.format_header("Test summary")?).map_err(fmt_err)?;
        self.format_protocol_summary(&mut output, Protocol::WebSocket, &summary.web_socket)?;
        writeln!(output).map_err(fmt_err)?;
        self.format_protocol_summary(&mut output, Protocol::Sse, &summary.sse)?;
        Ok(output.trim_end().to_string())
    }

    fn format_recommendation(&self, report: &Report) -> Result<String> {
        let recommendation = report.recommendation;
        let mut output = String::new();

        writeln!(output, "{}", self.format_header("Transport recommendation")?).map_err(fmt_err)?;
        let label = if recommendation.is_warning() { "Warning" } else { "Recommended" };
        writeln!(output, "{}: {}", label, recommendation.headline()).map_err(fmt_err)?;
        writeln!(output, "  Rationale:  {}", recommendation.rationale()).map_err(fmt_err)?;
        writeln!(output, "  Complexity: {}", recommendation.complexity().label()).map_err(fmt_err)?;

        let triggers = recommendation.degrade_triggers();
        if !triggers.is_empty() {
            writeln!(output, "  Degrade triggers:").map_err(fmt_err)?;
            for trigger in triggers {
                writeln!(output, "    - {}", trigger).map_err(fmt_err)?;
            }
        }

        Ok(output.trim_end().to_string())
    }

    fn format_environment_analysis(&self, report: &Report) -> Result<String> {
        let rows = analysis_rows(report, |ok| (if ok { "ok" } else { "FAIL" }).to_string());
        let mut output = String::new();
        writeln!(output, "{}", self.format_header("Environment analysis")?).map_err(fmt_err)?;
        output.push_str(&render_table(&self.analysis_table_format(), &rows));
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}
