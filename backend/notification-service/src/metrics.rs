use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};

static NOTIFICATIONS_DISPATCHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_dispatched_total",
            "Notification requests accepted by the dispatcher",
        ),
        &["type", "priority"],
    )
    .expect("failed to create notification_service_dispatched_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_dispatched_total");
    counter
});

static CHANNEL_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_channel_deliveries_total",
            "Per-channel delivery attempts by outcome",
        ),
        &["channel", "outcome"],
    )
    .expect("failed to create notification_service_channel_deliveries_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_channel_deliveries_total");
    counter
});

static SWEEP_RECORDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_sweep_records_total",
            "Records processed by the sweep by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create notification_service_sweep_records_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_sweep_records_total");
    counter
});

pub fn observe_dispatch(notification_type: &str, priority: &str) {
    NOTIFICATIONS_DISPATCHED_TOTAL
        .with_label_values(&[notification_type, priority])
        .inc();
}

pub fn observe_channel_delivery(channel: &str, outcome: &str) {
    CHANNEL_DELIVERIES_TOTAL
        .with_label_values(&[channel, outcome])
        .inc();
}

pub fn observe_sweep_record(outcome: &str) {
    SWEEP_RECORDS_TOTAL.with_label_values(&[outcome]).inc();
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
