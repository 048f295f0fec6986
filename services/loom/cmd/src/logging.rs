//! Log line formatting for the controller binary.
//!
//! Lines look like `[timestamp] [service/component] [level] message`. Events may
//! carry a `component = "..."` field, set most easily with the `component_*!`
//! macros, to name the part of the controller they come from.

use std::fmt;
use std::io::IsTerminal;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

/// Column widths
const SERVICE_NAME_WIDTH: usize = 16;
const LOG_LEVEL_WIDTH: usize = 7;

/// Log an info event tagged with a component
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

/// Log a warning tagged with a component
#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

/// Log a debug event tagged with a component
#[macro_export]
macro_rules! component_debug {
    ($component:expr, $($arg:tt)*) => {
        tracing::debug!(component = $component, $($arg)*)
    };
}

/// Log an error tagged with a component
#[macro_export]
macro_rules! component_error {
    ($component:expr, $($arg:tt)*) => {
        tracing::error!(component = $component, $($arg)*)
    };
}

/// Event formatter for the controller's console output
pub struct LoomLogFormatter {
    service_name: String,
    color_enabled: bool,
}

impl LoomLogFormatter {
    /// Create a formatter; colors are used only on a terminal
    pub fn new(service_name: impl Into<String>) -> Self {
        let dumb = std::env::var("TERM").map_or(false, |term| term == "dumb");
        Self {
            service_name: service_name.into(),
            color_enabled: !dumb && std::io::stdout().is_terminal(),
        }
    }

    fn format_service_name(&self, component: Option<&str>) -> String {
        let name = match component {
            Some(component) => format!("{}/{}", self.service_name, component),
            None => self.service_name.clone(),
        };

        if name.chars().count() > SERVICE_NAME_WIDTH {
            let truncated: String = name.chars().take(SERVICE_NAME_WIDTH - 1).collect();
            format!("{}…", truncated)
        } else {
            format!("{:<width$}", name, width = SERVICE_NAME_WIDTH)
        }
    }

    fn format_log_level(level: &Level) -> String {
        let label = match *level {
            Level::ERROR => "✗ ERROR",
            Level::WARN => "⚠ WARN",
            Level::INFO => "ℹ INFO",
            Level::DEBUG => "◦ DEBUG",
            Level::TRACE => "◦ TRACE",
        };
        format!("{:<width$}", label, width = LOG_LEVEL_WIDTH + 2)
    }

    fn color_for_level(&self, level: &Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }
        match *level {
            Level::ERROR => COLOR_BRIGHT_RED,
            Level::WARN => COLOR_BRIGHT_YELLOW,
            Level::INFO => COLOR_GREEN,
            Level::DEBUG | Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }
}

impl<S, N> FormatEvent<S, N> for LoomLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let level = event.metadata().level();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let (cyan, color, reset) = if self.color_enabled {
            (COLOR_CYAN, self.color_for_level(level), COLOR_RESET)
        } else {
            ("", "", "")
        };

        write!(
            writer,
            "{}[{}] [{}] [{}{}{}] ",
            cyan,
            timestamp,
            self.format_service_name(visitor.component.as_deref()),
            color,
            Self::format_log_level(level),
            reset
        )?;
        writeln!(writer, "{}{}", visitor.message, reset)
    }
}

/// Pulls the message and component out of an event
#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "component" => {
                let text = format!("{:?}", value);
                self.component = Some(text.trim_matches('"').to_string());
            }
            _ => {}
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(service: &str) -> LoomLogFormatter {
        LoomLogFormatter {
            service_name: service.to_string(),
            color_enabled: false,
        }
    }

    #[test]
    fn test_service_name_column() {
        let formatter = plain("loom");
        assert_eq!(formatter.format_service_name(None), format!("{:<16}", "loom"));
        assert_eq!(
            formatter.format_service_name(Some("runtime")).trim_end(),
            "loom/runtime"
        );

        let long = formatter.format_service_name(Some("a-very-long-component"));
        assert_eq!(long.chars().count(), SERVICE_NAME_WIDTH);
        assert!(long.ends_with('…'));
    }

    #[test]
    fn test_no_color_when_disabled() {
        let formatter = plain("loom");
        assert_eq!(formatter.color_for_level(&Level::ERROR), "");
        assert!(LoomLogFormatter::format_log_level(&Level::WARN).starts_with("⚠ WARN"));
    }
}
