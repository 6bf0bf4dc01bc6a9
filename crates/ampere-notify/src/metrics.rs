// Delivery metrics
// Counters are recorded through the `metrics` facade; the binary installs the exporter.

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Register metric descriptions. Call once at start-up.
pub fn init_metrics() {
    describe_counter!(
        "notifications_enqueued_total",
        "Total number of notification pages enqueued for delivery"
    );
    describe_counter!(
        "notifications_delivered_total",
        "Total number of notifications accepted by their destination"
    );
    describe_counter!(
        "notifications_rejected_total",
        "Total number of notifications permanently rejected by their destination"
    );
    describe_counter!(
        "notifications_retried_total",
        "Total number of delivery retries scheduled"
    );
    describe_counter!(
        "notifications_abandoned_total",
        "Total number of notifications dropped after exhausting retries"
    );
    describe_histogram!(
        "notification_payload_bytes",
        "Size of delivered notification payloads in bytes"
    );
}

pub fn record_enqueued(kind: &str, pages: usize) {
    counter!("notifications_enqueued_total", "kind" => kind.to_string()).increment(pages as u64);
}

pub fn record_delivered(payload_bytes: usize) {
    counter!("notifications_delivered_total").increment(1);
    histogram!("notification_payload_bytes").record(payload_bytes as f64);
}

pub fn record_rejected(status: Option<u16>) {
    let status = status.map_or_else(|| "none".to_string(), |s| s.to_string());
    counter!("notifications_rejected_total", "status" => status).increment(1);
}

pub fn record_retried() {
    counter!("notifications_retried_total").increment(1);
}

pub fn record_abandoned() {
    counter!("notifications_abandoned_total").increment(1);
}
