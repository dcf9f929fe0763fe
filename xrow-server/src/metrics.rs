//! Dispatch metrics definitions
//!
//! OpenTelemetry instruments for the dispatcher, exported through whatever
//! meter provider is installed globally (see
//! [`xrow_core::init_observability`]). All names are prefixed with
//! `xrow.server.*`.
//!
//! # Metrics Collected
//!
//! - **requests_total**: calls that reached the dispatcher (counter)
//! - **request_duration**: dispatch latency in seconds (histogram)
//! - **faults_total**: fault responses by fault code (counter)
//! - **rejections_total**: bodies rejected at the transport boundary (counter)
//!
//! # Examples
//!
//! ```rust,no_run
//! use xrow_server::DispatchMetrics;
//!
//! let metrics = DispatchMetrics::new("my-service");
//! metrics.record_request("echo", "success", 0.002);
//! metrics.record_fault("echo", -32602);
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Dispatcher metrics for monitoring
pub struct DispatchMetrics {
    pub requests_total: Counter<u64>,
    /// Dispatch duration in seconds, decode to encode
    pub request_duration: Histogram<f64>,
    pub faults_total: Counter<u64>,
    pub rejections_total: Counter<u64>,
}

impl DispatchMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create a new DispatchMetrics instance with a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("xrow.server.requests.total")
                .with_description("Total number of calls dispatched")
                .build(),
            request_duration: meter
                .f64_histogram("xrow.server.request.duration")
                .with_description("Call dispatch duration in seconds")
                .build(),
            faults_total: meter
                .u64_counter("xrow.server.faults.total")
                .with_description("Total number of fault responses")
                .build(),
            rejections_total: meter
                .u64_counter("xrow.server.rejections.total")
                .with_description("Total number of request bodies rejected before decoding")
                .build(),
        }
    }

    /// Record a dispatched call; `status` is `success` or `fault`
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_fault(&self, method: &str, code: i32) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("code", i64::from(code)),
        ];
        self.faults_total.add(1, attributes);
    }

    /// Record a transport rejection; `reason` names the failed check
    pub fn record_rejection(&self, reason: &str) {
        let attributes = &[KeyValue::new("reason", reason.to_string())];
        self.rejections_total.add(1, attributes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = DispatchMetrics::new("test-dispatch");

        metrics.record_request("echo", "success", 0.1);
        metrics.record_fault("echo", -32601);
        metrics.record_rejection("content_type");
    }

    #[test]
    fn test_request_metrics() {
        let metrics = DispatchMetrics::new("test-dispatch-req");

        metrics.record_request("add", "success", 0.05);
        metrics.record_request("multiply", "success", 0.03);
        metrics.record_request("divide", "fault", 0.01);
        metrics.record_fault("divide", -32500);
        metrics.record_fault("<unknown>", -32700);
    }
}
