// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, Metric, MetricData};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};
use tracing_subscriber::fmt::MakeWriter;

use crate::{EventSink, Fault, FaultKind, ResilienceEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TestKind {
    Transient,
    Timeout,
    Throttled,
    Auth,
    Validation,
}

impl FaultKind for TestKind {
    fn name(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Timeout => "timeout",
            Self::Throttled => "throttled",
            Self::Auth => "auth",
            Self::Validation => "validation",
        }
    }

    fn parent(self) -> Option<Self> {
        match self {
            Self::Timeout | Self::Throttled => Some(Self::Transient),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} failure", .kind.name())]
pub(crate) struct TestFault {
    pub kind: TestKind,
    pub retry_after: Option<Duration>,
}

impl TestFault {
    pub fn new(kind: TestKind) -> Self {
        Self { kind, retry_after: None }
    }

    pub fn with_retry_after(kind: TestKind, wait: Duration) -> Self {
        Self {
            kind,
            retry_after: Some(wait),
        }
    }
}

impl Fault for TestFault {
    type Kind = TestKind;

    fn kind(&self) -> TestKind {
        self.kind
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// Records the names of the events it receives.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingSink {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: &ResilienceEvent<'_>) {
        self.events.lock().unwrap().push(event.event_name().to_string());
    }
}

/// Collects `OTel` metric attributes for assertions.
#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricTester {
    pub fn new() -> Self {
        let exporter = InMemoryMetricExporter::default();

        Self {
            provider: SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build(),
            exporter,
        }
    }

    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    pub fn collect_attributes(&self) -> Vec<KeyValue> {
        self.provider.force_flush().unwrap();
        self.exporter
            .get_finished_metrics()
            .unwrap()
            .iter()
            .flat_map(opentelemetry_sdk::metrics::data::ResourceMetrics::scope_metrics)
            .flat_map(opentelemetry_sdk::metrics::data::ScopeMetrics::metrics)
            .flat_map(attributes_for_metric)
            .collect()
    }

    pub fn assert_attributes_contain(&self, key_values: &[KeyValue]) {
        let attributes = self.collect_attributes();

        for attr in key_values {
            assert!(
                attributes.contains(attr),
                "attribute {attr:?} not found in collected attributes: {attributes:?}"
            );
        }
    }
}

fn attributes_for_metric(metric: &Metric) -> Vec<KeyValue> {
    match metric.data() {
        AggregatedMetrics::U64(MetricData::Sum(data)) => data.data_points().flat_map(|point| point.attributes().cloned()).collect(),
        _ => Vec::new(),
    }
}

/// Captures formatted `tracing` output of the current thread.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).to_string()
    }

    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "log output does not contain '{expected}', got:\n{output}"
        );
    }

    /// Use with `set_default()` for thread-local capture.
    pub fn subscriber(&self) -> impl tracing::Subscriber {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

pub(crate) struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
