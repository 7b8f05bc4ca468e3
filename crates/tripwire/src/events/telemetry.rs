// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use super::{EventSink, ResilienceEvent};

/// Sink built from a [`ResilienceContext`](super::ResilienceContext).
///
/// Reports events through `tracing` and OpenTelemetry when enabled, then hands
/// them to the user sink, if any.
#[derive(Debug, Clone)]
pub(crate) struct TelemetrySink {
    #[cfg_attr(
        not(any(feature = "metrics", feature = "logs", test)),
        expect(dead_code, reason = "only read by logs and metrics")
    )]
    pub(crate) pipeline_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    #[cfg_attr(not(any(feature = "logs", test)), expect(dead_code, reason = "only read by logs"))]
    pub(crate) logs_enabled: bool,
    pub(crate) forward: Option<Arc<dyn EventSink>>,
}

impl EventSink for TelemetrySink {
    fn on_event(&self, event: &ResilienceEvent<'_>) {
        #[cfg(any(feature = "logs", test))]
        if self.logs_enabled {
            self.log(event);
        }

        #[cfg(any(feature = "metrics", test))]
        if let Some(reporter) = &self.event_reporter {
            use super::{EVENT_NAME, OPERATION_NAME, PIPELINE_NAME, STRATEGY_NAME};

            reporter.add(
                1,
                &[
                    opentelemetry::KeyValue::new(PIPELINE_NAME, self.pipeline_name.clone()),
                    opentelemetry::KeyValue::new(STRATEGY_NAME, event.strategy_name()),
                    opentelemetry::KeyValue::new(EVENT_NAME, event.event_name()),
                    opentelemetry::KeyValue::new(OPERATION_NAME, event.name().to_owned()),
                ],
            );
        }

        if let Some(forward) = &self.forward {
            forward.on_event(event);
        }
    }
}

#[cfg(any(feature = "logs", test))]
impl TelemetrySink {
    fn log(&self, event: &ResilienceEvent<'_>) {
        match *event {
            ResilienceEvent::CircuitCreated { name } => tracing::event!(
                name: "tripwire.circuit",
                tracing::Level::DEBUG,
                pipeline.name = %self.pipeline_name,
                circuit.name = name,
                circuit.event = "circuit_created",
            ),
            ResilienceEvent::CircuitTripped {
                name,
                consecutive_failures,
            } => tracing::event!(
                name: "tripwire.circuit",
                tracing::Level::WARN,
                pipeline.name = %self.pipeline_name,
                circuit.name = name,
                circuit.event = "circuit_opened",
                circuit.consecutive_failures = consecutive_failures,
            ),
            ResilienceEvent::CircuitProbing { name } => tracing::event!(
                name: "tripwire.circuit",
                tracing::Level::INFO,
                pipeline.name = %self.pipeline_name,
                circuit.name = name,
                circuit.event = "circuit_probing",
            ),
            ResilienceEvent::CircuitRecovered { name, open_duration } => tracing::event!(
                name: "tripwire.circuit",
                tracing::Level::INFO,
                pipeline.name = %self.pipeline_name,
                circuit.name = name,
                circuit.event = "circuit_closed",
                circuit.open_duration = open_duration.as_secs_f32(),
            ),
            ResilienceEvent::CircuitReopened { name } => tracing::event!(
                name: "tripwire.circuit",
                tracing::Level::WARN,
                pipeline.name = %self.pipeline_name,
                circuit.name = name,
                circuit.event = "circuit_reopened",
            ),
            ResilienceEvent::RetryAttempted {
                name,
                attempt,
                error_kind,
                wait,
            } => tracing::event!(
                name: "tripwire.retry",
                tracing::Level::WARN,
                pipeline.name = %self.pipeline_name,
                operation.name = name,
                resilience.attempt.number = attempt,
                resilience.error.kind = error_kind,
                resilience.retry.delay = wait.as_secs_f32(),
            ),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use opentelemetry::KeyValue;
    use tick::Clock;
    use tracing_subscriber::util::SubscriberInitExt;

    use super::*;
    use crate::ResilienceContext;
    use crate::testing::{LogCapture, MetricTester, RecordingSink};

    #[test]
    #[cfg(not(miri))]
    fn metrics_record_event_attributes() {
        let tester = MetricTester::new();
        let sink = ResilienceContext::new(Clock::new_frozen())
            .name("checkout")
            .enable_metrics(tester.meter_provider())
            .create_sink();

        sink.on_event(&ResilienceEvent::CircuitTripped {
            name: "payments",
            consecutive_failures: 5,
        });
        sink.on_event(&ResilienceEvent::RetryAttempted {
            name: "payments",
            attempt: 1,
            error_kind: "timeout",
            wait: Duration::from_millis(10),
        });

        tester.assert_attributes_contain(&[
            KeyValue::new("resilience.pipeline.name", "checkout"),
            KeyValue::new("resilience.strategy.name", "circuit_breaker"),
            KeyValue::new("resilience.strategy.name", "retry"),
            KeyValue::new("resilience.event.name", "circuit_opened"),
            KeyValue::new("resilience.event.name", "retry"),
            KeyValue::new("resilience.operation.name", "payments"),
        ]);
    }

    #[test]
    fn logs_are_emitted_when_enabled() {
        let capture = LogCapture::default();
        let _guard = capture.subscriber().set_default();

        let recording = RecordingSink::default();
        let sink = ResilienceContext::new(Clock::new_frozen())
            .name("log_pipeline")
            .enable_logs()
            .event_sink(recording.clone())
            .create_sink();

        sink.on_event(&ResilienceEvent::CircuitTripped {
            name: "db",
            consecutive_failures: 4,
        });
        sink.on_event(&ResilienceEvent::CircuitProbing { name: "db" });
        sink.on_event(&ResilienceEvent::CircuitRecovered {
            name: "db",
            open_duration: Duration::from_secs(30),
        });
        sink.on_event(&ResilienceEvent::CircuitReopened { name: "db" });
        sink.on_event(&ResilienceEvent::RetryAttempted {
            name: "db",
            attempt: 2,
            error_kind: "transient",
            wait: Duration::from_secs(1),
        });

        capture.assert_contains("log_pipeline");
        capture.assert_contains("circuit_opened");
        capture.assert_contains("circuit.consecutive_failures=4");
        capture.assert_contains("circuit_probing");
        capture.assert_contains("circuit_closed");
        capture.assert_contains("circuit_reopened");
        capture.assert_contains("resilience.attempt.number=2");
        capture.assert_contains("resilience.retry.delay");
        assert_eq!(recording.events().len(), 5);
    }

    #[test]
    fn logs_are_silent_when_disabled() {
        let capture = LogCapture::default();
        let _guard = capture.subscriber().set_default();

        let recording = RecordingSink::default();
        let sink = ResilienceContext::new(Clock::new_frozen())
            .event_sink(recording.clone())
            .create_sink();

        sink.on_event(&ResilienceEvent::CircuitProbing { name: "db" });

        assert!(capture.output().is_empty());
        assert_eq!(recording.events(), vec!["circuit_probing"]);
    }
}
