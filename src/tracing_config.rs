//! Tracing subscriber setup for the `remove-bg` binary
//!
//! The library only emits events; the binary decides where they go. Logs are
//! written to stderr so stdout carries nothing but the confirmation line.
//! `log` records from the backends are bridged into the same subscriber.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Human-readable, coloured output
    #[default]
    Console,
    /// Compact output without colours, for CI logs
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Verbosity level from repeated `-v`
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Filter directive (overrides verbosity if set)
    pub env_filter: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Convert verbosity level to a filter directive
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Filter directive that will be installed
    #[must_use]
    pub fn filter_directive(&self) -> String {
        self.env_filter
            .clone()
            .unwrap_or_else(|| self.verbosity_to_filter().to_string())
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        let filter = EnvFilter::try_new(self.filter_directive())?;
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(false)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(fmt_layer).try_init()?;
            },
        }

        Ok(())
    }
}

/// Initialize tracing with CLI defaults
///
/// # Errors
/// - See [`TracingConfig::init`]
pub fn init_cli_tracing(verbosity: u8, filter: Option<&str>) -> anyhow::Result<()> {
    let mut config = TracingConfig::new().with_verbosity(verbosity);
    if let Some(filter) = filter {
        config = config.with_env_filter(filter);
    }
    config.init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let levels: Vec<_> = (0..4)
            .map(|v| TracingConfig::new().with_verbosity(v).verbosity_to_filter())
            .collect();
        assert_eq!(levels, vec!["info", "debug", "trace", "trace"]);
    }

    #[test]
    fn test_filter_overrides_verbosity() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_env_filter("closet_bgremove=debug,ort=warn");
        assert_eq!(config.filter_directive(), "closet_bgremove=debug,ort=warn");
        assert_eq!(TracingConfig::new().filter_directive(), "info");
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = TracingConfig::new().with_env_filter("closet_bgremove=loudest");
        assert!(config.init().is_err());
    }
}
