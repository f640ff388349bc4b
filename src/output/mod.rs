//! Output formatting and display system
//!
//! This module provides a flexible output formatting system for probe results
//! and recommendations, supporting both colored and plain text output, plus
//! the JSON export of a completed run.

mod colored;
mod export;
mod formatter;

pub use colored::{ColorScheme, ColoredFormatter, LatencyLevel};
pub use export::{ExportDocument, ResultExporter};
pub use formatter::{
    format_ms, format_percentage, render_table, Alignment, Column, FormattingOptions, OutputFormatter,
    PlainFormatter, RowData, TableFormat,
};

use crate::error::Result;
use crate::stats::Report;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..Default::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, true)
    }
}

/// Renders the end-of-run report
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
}

impl OutputCoordinator {
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter }
    }

    pub fn formatter(&self) -> &dyn OutputFormatter {
        self.formatter.as_ref()
    }

    /// Summary, recommendation and per-environment analysis, in that order
    pub fn display_report(&self, report: &Report) -> Result<String> {
        let sections = [
            self.formatter.format_summary(&report.summary)?,
            self.formatter.format_recommendation(report)?,
            self.formatter.format_environment_analysis(report)?,
        ];

        Ok(sections.join("\n\n"))
    }
}
