//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Event publish counts by topic
//! - Event delivery and drop counts
//! - Active subscription gauge
//! - Store transaction outcomes

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Events published, by topic
pub static EVENTS_PUBLISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_published_total", "Total number of domain events published")
            .namespace("social_core"),
        &["topic"],
    )
    .expect("Failed to create EVENTS_PUBLISHED_TOTAL metric")
});

/// Event deliveries to matching subscribers, by topic
pub static EVENT_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "event_deliveries_total",
            "Total number of per-subscription event deliveries",
        )
        .namespace("social_core"),
        &["topic"],
    )
    .expect("Failed to create EVENT_DELIVERIES_TOTAL metric")
});

/// Deliveries dropped because a subscriber's buffer was full or closed
pub static EVENT_DELIVERIES_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "event_deliveries_dropped_total",
            "Deliveries dropped due to a full or disconnected subscriber",
        )
        .namespace("social_core"),
        &["topic"],
    )
    .expect("Failed to create EVENT_DELIVERIES_DROPPED_TOTAL metric")
});

/// Active subscription gauge, by topic
pub static SUBSCRIPTIONS_ACTIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("subscriptions_active", "Number of live event subscriptions")
            .namespace("social_core"),
        &["topic"],
    )
    .expect("Failed to create SUBSCRIPTIONS_ACTIVE metric")
});

/// Store transaction counter, by outcome ("committed", "failed")
pub static STORE_TRANSACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("store_transactions_total", "Entity store transactions by outcome")
            .namespace("social_core"),
        &["outcome"],
    )
    .expect("Failed to create STORE_TRANSACTIONS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(EVENTS_PUBLISHED_TOTAL.clone()))
        .expect("Failed to register EVENTS_PUBLISHED_TOTAL");
    registry
        .register(Box::new(EVENT_DELIVERIES_TOTAL.clone()))
        .expect("Failed to register EVENT_DELIVERIES_TOTAL");
    registry
        .register(Box::new(EVENT_DELIVERIES_DROPPED_TOTAL.clone()))
        .expect("Failed to register EVENT_DELIVERIES_DROPPED_TOTAL");
    registry
        .register(Box::new(SUBSCRIPTIONS_ACTIVE.clone()))
        .expect("Failed to register SUBSCRIPTIONS_ACTIVE");
    registry
        .register(Box::new(STORE_TRANSACTIONS_TOTAL.clone()))
        .expect("Failed to register STORE_TRANSACTIONS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Metrics should be valid UTF-8")
}

/// Helper to record a published event
pub fn record_event_published(topic: &str) {
    EVENTS_PUBLISHED_TOTAL.with_label_values(&[topic]).inc();
}

/// Helper to record a successful delivery
pub fn record_event_delivered(topic: &str) {
    EVENT_DELIVERIES_TOTAL.with_label_values(&[topic]).inc();
}

/// Helper to record a dropped delivery
pub fn record_event_dropped(topic: &str) {
    EVENT_DELIVERIES_DROPPED_TOTAL
        .with_label_values(&[topic])
        .inc();
}

/// Helper called when a subscription is registered
pub fn record_subscription_opened(topic: &str) {
    SUBSCRIPTIONS_ACTIVE.with_label_values(&[topic]).inc();
}

/// Helper called when a subscription is dropped
pub fn record_subscription_closed(topic: &str) {
    SUBSCRIPTIONS_ACTIVE.with_label_values(&[topic]).dec();
}

/// Helper to record a store transaction outcome
pub fn record_store_transaction(outcome: &str) {
    STORE_TRANSACTIONS_TOTAL.with_label_values(&[outcome]).inc();
}
