// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use tick::Clock;

use super::{EventSink, TelemetrySink};

pub(crate) const DEFAULT_PIPELINE_NAME: &str = "default";

/// Shared dependencies of retries and circuit breakers.
///
/// Pass one context to every [`RetryExecutor`](crate::RetryExecutor),
/// [`CircuitBreakerRegistry`](crate::CircuitBreakerRegistry) or
/// [`Resilience`](crate::Resilience) that should share a clock and telemetry
/// configuration.
///
/// # Examples
///
/// ```
/// use tick::Clock;
/// use tripwire::ResilienceContext;
///
/// # fn clock() -> Clock { unimplemented!() }
/// # fn _example() {
/// let context = ResilienceContext::new(clock()).name("checkout");
/// # }
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ResilienceContext {
    clock: Clock,
    name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
    logs_enabled: bool,
    sink: Option<Arc<dyn EventSink>>,
}

impl ResilienceContext {
    /// Create a context with a clock. Initializes with `name = "default"`.
    pub fn new(clock: impl AsRef<Clock>) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            name: Cow::Borrowed(DEFAULT_PIPELINE_NAME),
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            logs_enabled: false,
            sink: None,
        }
    }

    /// Set the pipeline name for telemetry correlation. Prefer `snake_case`.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Enable metrics reporting with the given OpenTelemetry meter provider.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    pub fn enable_metrics(self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        Self {
            meter: Some(super::metrics::create_meter(provider)),
            ..self
        }
    }

    /// Enable structured logging for resilience events.
    #[must_use]
    #[cfg(any(feature = "logs", test))]
    pub fn enable_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    /// Deliver every event to `sink` in addition to logs and metrics.
    #[must_use]
    pub fn event_sink(self, sink: impl EventSink + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
            ..self
        }
    }

    /// The clock used for waits and circuit timestamps.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The pipeline name.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.name
    }

    pub(crate) const fn logs_enabled(&self) -> bool {
        self.logs_enabled
    }

    pub(crate) fn create_sink(&self) -> Arc<dyn EventSink> {
        Arc::new(TelemetrySink {
            pipeline_name: self.name.clone(),
            #[cfg(any(feature = "metrics", test))]
            event_reporter: self.meter.as_ref().map(super::metrics::create_resilience_event_counter),
            logs_enabled: self.logs_enabled,
            forward: self.sink.clone(),
        })
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResilienceEvent;
    use crate::testing::RecordingSink;

    #[test]
    fn defaults() {
        let context = ResilienceContext::new(Clock::new_frozen());

        assert_eq!(context.pipeline_name(), DEFAULT_PIPELINE_NAME);
        assert!(!context.logs_enabled);
        assert!(context.meter.is_none());
        let _ = context.clock().system_time();
    }

    #[test]
    fn name_accepts_owned_strings() {
        let context = ResilienceContext::new(Clock::new_frozen()).name(String::from("checkout"));
        assert_eq!(context.pipeline_name(), "checkout");
    }

    #[test]
    fn created_sink_forwards_to_custom_sink() {
        let recording = RecordingSink::default();
        let context = ResilienceContext::new(Clock::new_frozen()).event_sink(recording.clone());

        context
            .create_sink()
            .on_event(&ResilienceEvent::CircuitReopened { name: "db" });

        assert_eq!(recording.events(), vec!["circuit_reopened"]);
    }
}
