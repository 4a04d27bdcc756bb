use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

static NOTIFICATIONS_WRITTEN_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "marketplace_notifications_written_total",
            "Inbox notifications written, by type",
        ),
        &["type"],
    )
    .expect("failed to create marketplace_notifications_written_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register marketplace_notifications_written_total");
    counter
});

static PUSH_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "marketplace_push_deliveries_total",
            "Push delivery attempts, by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create marketplace_push_deliveries_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register marketplace_push_deliveries_total");
    counter
});

static PUSH_TOKENS_PRUNED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "marketplace_push_tokens_pruned_total",
        "Device tokens removed after the push provider rejected them",
    )
    .expect("failed to create marketplace_push_tokens_pruned_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register marketplace_push_tokens_pruned_total");
    counter
});

static CONVERSATIONS_PURGED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "marketplace_conversations_purged_total",
        "Conversations deleted after every participant hid them",
    )
    .expect("failed to create marketplace_conversations_purged_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register marketplace_conversations_purged_total");
    counter
});

static TRIGGER_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "marketplace_trigger_failures_total",
            "Trigger invocations that returned an error, by trigger",
        ),
        &["trigger"],
    )
    .expect("failed to create marketplace_trigger_failures_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register marketplace_trigger_failures_total");
    counter
});

pub fn record_notification_written(notification_type: &str) {
    NOTIFICATIONS_WRITTEN_TOTAL
        .with_label_values(&[notification_type])
        .inc();
}

pub fn record_push_delivery(outcome: &str) {
    PUSH_DELIVERIES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_tokens_pruned(count: usize) {
    PUSH_TOKENS_PRUNED_TOTAL.inc_by(count as u64);
}

pub fn record_conversation_purged() {
    CONVERSATIONS_PURGED_TOTAL.inc();
}

pub fn record_trigger_failure(trigger: &str) {
    TRIGGER_FAILURES_TOTAL.with_label_values(&[trigger]).inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;

    #[test]
    fn test_serve_metrics_exposes_counters() {
        record_notification_written("item_sold");
        record_push_delivery("delivered");

        let resp = tokio_test::block_on(serve_metrics());
        assert!(resp.status().is_success());

        let body = resp.into_body().try_into_bytes().unwrap_or_default();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("marketplace_notifications_written_total"));
        assert!(text.contains("marketplace_push_deliveries_total"));
    }
}
