//! Per-call telemetry.
//!
//! Every public [`crate::Client`] operation produces exactly one
//! [`Measurement`], handed to the configured [`MeasurementSink`] when the call
//! returns, whatever the outcome.

use std::sync::Mutex;
use std::time::Duration;

use crate::error::ClientError;

/// Error classification attached to a measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasuredError {
    Canceled,
    Other(String),
}

impl MeasuredError {
    pub fn from_client_error(error: &ClientError) -> Self {
        match error {
            ClientError::Cancelled => Self::Canceled,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Outcome of one client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    pub operation: &'static str,
    pub host: String,
    pub status_code: Option<u16>,
    pub error: Option<MeasuredError>,
    /// Request send to response headers.
    pub latency: Duration,
    /// Number of results, when known up front (batch responses only).
    pub length: Option<usize>,
}

impl Measurement {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            host: String::new(),
            status_code: None,
            error: None,
            latency: Duration::ZERO,
            length: None,
        }
    }

    pub fn error_tag(&self) -> &'static str {
        match self.error {
            None => "None",
            Some(MeasuredError::Canceled) => "Canceled",
            Some(MeasuredError::Other(_)) => "Other",
        }
    }
}

/// Destination for measurements. Called once per client call.
pub trait MeasurementSink: Send + Sync {
    fn record(&self, measurement: &Measurement);
}

/// Emits each measurement as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMeasurementSink;

impl MeasurementSink for TracingMeasurementSink {
    fn record(&self, measurement: &Measurement) {
        tracing::debug!(
            target: "delroute::measurement",
            operation = measurement.operation,
            host = %measurement.host,
            code = measurement.status_code.unwrap_or_default(),
            error = measurement.error_tag(),
            latency_ms = measurement.latency.as_secs_f64() * 1_000.0,
            length = measurement.length,
            "delegated routing call"
        );
    }
}

/// Keeps measurements in memory.
#[derive(Debug, Default)]
pub struct RecordingMeasurementSink {
    recorded: Mutex<Vec<Measurement>>,
}

impl RecordingMeasurementSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn measurements(&self) -> Vec<Measurement> {
        match self.recorded.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MeasurementSink for RecordingMeasurementSink {
    fn record(&self, measurement: &Measurement) {
        let mut recorded = match self.recorded.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        recorded.push(measurement.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_tag_distinguishes_cancellation() {
        let mut measurement = Measurement::new("FindProviders");
        assert_eq!(measurement.error_tag(), "None");

        measurement.error = Some(MeasuredError::from_client_error(&ClientError::Cancelled));
        assert_eq!(measurement.error_tag(), "Canceled");

        measurement.error = Some(MeasuredError::from_client_error(&ClientError::ResultCount(2)));
        assert_eq!(measurement.error_tag(), "Other");
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingMeasurementSink::new();
        sink.record(&Measurement::new("FindProviders"));
        sink.record(&Measurement::new("ProvideBitswap"));

        let operations = sink
            .measurements()
            .into_iter()
            .map(|m| m.operation)
            .collect::<Vec<_>>();
        assert_eq!(operations, vec!["FindProviders", "ProvideBitswap"]);
    }
}
