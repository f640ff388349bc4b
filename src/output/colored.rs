//! Colored formatter implementation with terminal color support
//!
//! This module provides a colored output formatter that uses
//! ANSI colors and Unicode symbols for enhanced visual presentation.

use super::formatter::{
    analysis_rows, fmt_err, format_ms, format_percentage, render_table, FormattingOptions, OutputFormatter,
    PlainFormatter,
};
use crate::error::Result;
use crate::models::{EnvironmentConfig, EnvironmentRunResult, ProbeResult, ProtocolSummary, RunSummary};
use crate::stats::{Recommendation, Report};
use crate::types::{EnvironmentOutcome, Protocol};
use colored::*;
use std::fmt::Write as _;

/// Latency classification for color coding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencyLevel {
    Excellent, // < 50ms
    Good,      // 50-100ms
    Fair,      // 100-300ms
    Poor,      // 300-1000ms
    VeryPoor,  // > 1000ms
}

impl LatencyLevel {
    pub fn from_latency(time_ms: f64) -> Self {
        if time_ms < 50.0 {
            Self::Excellent
        } else if time_ms < 100.0 {
            Self::Good
        } else if time_ms < 300.0 {
            Self::Fair
        } else if time_ms < 1000.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn check_mark(&self, ok: bool) -> ColoredString {
        if ok {
            self.colorize("✅", self.color_scheme.success)
        } else {
            self.colorize("❌", self.color_scheme.error)
        }
    }

    fn latency_colored(&self, value: Option<f64>) -> ColoredString {
        let text = format_ms(value);
        match value {
            Some(ms) => self.colorize(&text, LatencyLevel::from_latency(ms).color()),
            None => self.colorize(&text, self.color_scheme.muted),
        }
    }

    /// Percentage colored against the recommendation thresholds
    fn percentage_colored(&self, percentage: f64) -> ColoredString {
        let color = if percentage >= 85.0 {
            self.color_scheme.success
        } else if percentage >= 70.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        };
        self.colorize(&format_percentage(percentage), color)
    }

    fn bold_colored(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color).bold()
        } else {
            text.normal()
        }
    }

    fn section_header(&self, title: &str, icon: &str) -> String {
        format!(
            "{} {}\n{}",
            icon,
            self.bold_colored(title, self.color_scheme.header),
            self.colorize(&"=".repeat(37), self.color_scheme.muted)
        )
    }

    fn outcome_color(&self, outcome: EnvironmentOutcome) -> Color {
        match outcome {
            EnvironmentOutcome::BothOk => self.color_scheme.success,
            EnvironmentOutcome::WebSocketOnly => self.color_scheme.info,
            EnvironmentOutcome::SseOnly => self.color_scheme.warning,
            EnvironmentOutcome::NeitherOk => self.color_scheme.error,
        }
    }

    fn format_probe(&self, output: &mut String, protocol: Protocol, probe: &ProbeResult) -> Result<()> {
        let icon = match protocol {
            Protocol::WebSocket => "🔌",
            Protocol::Sse => "📡",
        };
        writeln!(output, "    {} {}:", icon, self.bold(protocol.name())).map_err(fmt_err)?;
        writeln!(output, "      Connected:       {}", self.check_mark(probe.connection_success)).map_err(fmt_err)?;
        writeln!(output, "      Connection time: {}", self.latency_colored(probe.connection_time_ms)).map_err(fmt_err)?;
        writeln!(output, "      Mean latency:    {}", self.latency_colored(probe.mean_latency_ms())).map_err(fmt_err)?;
        writeln!(output, "      Reconnected:     {}", self.check_mark(probe.reconnect_success)).map_err(fmt_err)?;

        let error_count = probe.error_count().to_string();
        let error_count = if probe.errors.is_empty() {
            self.colorize(&error_count, self.color_scheme.muted)
        } else {
            self.colorize(&error_count, self.color_scheme.warning)
        };
        writeln!(output, "      Errors:          {}", error_count).map_err(fmt_err)?;

        if self.options.verbose_mode {
            for error in &probe.errors {
                writeln!(output, "        {} {}", self.colorize("-", self.color_scheme.muted), self.colorize(error, self.color_scheme.error))
                    .map_err(fmt_err)?;
            }
        }
        Ok(())
    }

    fn format_protocol_summary(&self, output: &mut String, protocol: Protocol, summary: &ProtocolSummary) -> Result<()> {
        writeln!(output, "{} overall:", self.bold(protocol.name())).map_err(fmt_err)?;
        writeln!(
            output,
            "  Success rate:   {} ({}/{})",
            self.percentage_colored(summary.success_rate_percent()),
            summary.success_count,
            summary.total_count
        )
        .map_err(fmt_err)?;
        writeln!(output, "  Mean latency:   {}", self.latency_colored(Some(summary.mean_latency_ms))).map_err(fmt_err)?;
        writeln!(output, "  Reconnect rate: {}", self.percentage_colored(summary.reconnect_rate_percent)).map_err(fmt_err)?;
        Ok(())
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        Ok(self.section_header(title, "🚀"))
    }

    fn format_environment_start(&self, environment: &EnvironmentConfig) -> Result<String> {
        let mut output = format!("📊 Testing environment: {}", self.bold(&environment.description));
        if let Some(proxy) = &environment.proxy {
            write!(output, " {}", self.colorize(&format!("(via {})", proxy), self.color_scheme.muted)).map_err(fmt_err)?;
        }
        Ok(output)
    }

    fn format_environment_result(&self, result: &EnvironmentRunResult) -> Result<String> {
        let mut output = String::new();
        let title = format!("Results - {}:", result.name.to_uppercase());
        writeln!(output, "  {}", self.bold(&title)).map_err(fmt_err)?;
        self.format_probe(&mut output, Protocol::WebSocket, &result.web_socket)?;
        self.format_probe(&mut output, Protocol::Sse, &result.sse)?;
        Ok(output.trim_end().to_string())
    }

    fn format_summary(&self, summary: &RunSummary) -> Result<String> {
        let mut output = String::new();
        writeln!(output, "{}", self.section_header("Test summary", "📋")).map_err(fmt_err)?;
        self.format_protocol_summary(&mut output, Protocol::WebSocket, &summary.web_socket)?;
        writeln!(output).map_err(fmt_err)?;
        self.format_protocol_summary(&mut output, Protocol::Sse, &summary.sse)?;
        Ok(output.trim_end().to_string())
    }

    fn format_recommendation(&self, report: &Report) -> Result<String> {
        let recommendation = report.recommendation;
        let (icon, label, color) = match recommendation {
            Recommendation::WebSocketOnly => ("✅", "Recommended", self.color_scheme.success),
            Recommendation::WebSocketWithSseFallback => ("⚠️ ", "Recommended", self.color_scheme.warning),
            Recommendation::PreferSse => ("🔄", "Recommended", self.color_scheme.info),
            Recommendation::BothUnreliable => ("❌", "Warning", self.color_scheme.error),
        };

        let mut output = String::new();
        writeln!(output, "{}", self.section_header("Transport recommendation", "🎯")).map_err(fmt_err)?;
        writeln!(
            output,
            "{} {}: {}",
            icon,
            label,
            self.bold_colored(recommendation.headline(), color)
        )
        .map_err(fmt_err)?;
        writeln!(output, "   Rationale:  {}", recommendation.rationale()).map_err(fmt_err)?;
        writeln!(output, "   Complexity: {}", recommendation.complexity().label()).map_err(fmt_err)?;

        let triggers = recommendation.degrade_triggers();
        if !triggers.is_empty() {
            writeln!(output, "   Degrade triggers:").map_err(fmt_err)?;
            for trigger in triggers {
                writeln!(output, "     - {}", trigger).map_err(fmt_err)?;
            }
        }

        Ok(output.trim_end().to_string())
    }

    fn format_environment_analysis(&self, report: &Report) -> Result<String> {
        let format = self.plain_formatter.analysis_table_format();
        let rows = analysis_rows(report, |ok| (if ok { "✓" } else { "✗" }).to_string());
        let table = render_table(&format, &rows);

        // Border, header and border precede the data rows
        let header_lines = if format.show_borders { 3 } else { 1 };
        let mut output = String::new();
        writeln!(output, "{}", self.section_header("Environment analysis", "📊")).map_err(fmt_err)?;

        for (idx, line) in table.lines().enumerate() {
            let styled = match idx.checked_sub(header_lines).and_then(|row| report.environments.get(row)) {
                Some(env) => self.colorize(line, self.outcome_color(env.outcome)),
                None if idx < header_lines => self.bold(line),
                None => self.colorize(line, self.color_scheme.muted),
            };
            writeln!(output, "{}", styled).map_err(fmt_err)?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("❌ {}", self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("⚠️  {}", self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("✅ {}", self.colorize(message, self.color_scheme.success)))
    }
}
