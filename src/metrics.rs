//! Prometheus metrics collection for chatlogd.
//!
//! Exposed on the web view's `/metrics` endpoint.
//!
//! - `chatlog_updates_total` - Updates received from long polling
//! - `chatlog_messages_archived_total` - Messages written to the archive
//! - `chatlog_command_total{command}` - Commands processed by name
//! - `chatlog_command_duration_seconds{command}` - Command latency histogram
//! - `chatlog_flood_accusations_total{outcome}` - Flood accusations by outcome
//! - `chatlog_media_downloads_total{result}` - Media fetches by result
//! - `chatlog_feed_items_total` - New feed items broadcast

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Updates received from the platform.
pub static UPDATES_RECEIVED: OnceLock<IntCounter> = OnceLock::new();

/// Messages written to the archive (incoming and bot-sent).
pub static MESSAGES_ARCHIVED: OnceLock<IntCounter> = OnceLock::new();

/// Messages the bot sent.
pub static MESSAGES_SENT: OnceLock<IntCounter> = OnceLock::new();

/// Members expelled by flood moderation.
pub static FLOODERS_KICKED: OnceLock<IntCounter> = OnceLock::new();

/// New feed items broadcast to chats.
pub static FEED_ITEMS: OnceLock<IntCounter> = OnceLock::new();

/// Bytes of media written under the static directory.
pub static MEDIA_BYTES: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Labelled counters and histograms
// ========================================================================

/// Commands processed by name.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command processing latency by name.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Command errors by name and error kind.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Flood accusations by outcome.
pub static ACCUSATIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Media fetches by result (downloaded, cached, failed).
pub static MEDIA_DOWNLOADS: OnceLock<IntCounterVec> = OnceLock::new();

/// File name lookups by the tier that answered (memory, store, remote).
pub static FILE_CACHE_LOOKUPS: OnceLock<IntCounterVec> = OnceLock::new();

/// Feed refresh cycles by result.
pub static FEED_CYCLES: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Live (accused, accuser) pairs in the abuse cache.
pub static ABUSE_PAIRS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(UPDATES_RECEIVED, IntCounter::new("chatlog_updates_total", "Updates received from long polling"));
    register!(MESSAGES_ARCHIVED, IntCounter::new("chatlog_messages_archived_total", "Messages written to the archive"));
    register!(MESSAGES_SENT, IntCounter::new("chatlog_messages_sent_total", "Messages sent by the bot"));
    register!(FLOODERS_KICKED, IntCounter::new("chatlog_flooders_kicked_total", "Members expelled for flooding"));
    register!(FEED_ITEMS, IntCounter::new("chatlog_feed_items_total", "New feed items broadcast"));
    register!(MEDIA_BYTES, IntCounter::new("chatlog_media_bytes_total", "Bytes of media downloaded"));

    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("chatlog_command_total", "Commands processed by name"), &["command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("chatlog_command_duration_seconds", "Command latency by name")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["command"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("chatlog_command_errors_total", "Command errors by name"), &["command", "error"]));
    register!(ACCUSATIONS, IntCounterVec::new(Opts::new("chatlog_flood_accusations_total", "Flood accusations by outcome"), &["outcome"]));
    register!(MEDIA_DOWNLOADS, IntCounterVec::new(Opts::new("chatlog_media_downloads_total", "Media fetches by result"), &["kind", "result"]));
    register!(FILE_CACHE_LOOKUPS, IntCounterVec::new(Opts::new("chatlog_file_cache_lookups_total", "File name lookups by answering tier"), &["tier"]));
    register!(FEED_CYCLES, IntCounterVec::new(Opts::new("chatlog_feed_cycles_total", "Feed refresh cycles by result"), &["result"]));
    register!(ABUSE_PAIRS, IntGauge::new("chatlog_abuse_pairs", "Live accusation pairs in memory"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

fn inc(metric: &OnceLock<IntCounter>) {
    if let Some(c) = metric.get() {
        c.inc();
    }
}

fn inc_labels(metric: &OnceLock<IntCounterVec>, labels: &[&str]) {
    if let Some(c) = metric.get() {
        c.with_label_values(labels).inc();
    }
}

#[inline]
pub fn record_update() {
    inc(&UPDATES_RECEIVED);
}

#[inline]
pub fn record_archived() {
    inc(&MESSAGES_ARCHIVED);
}

#[inline]
pub fn record_sent() {
    inc(&MESSAGES_SENT);
}

#[inline]
pub fn record_kick() {
    inc(&FLOODERS_KICKED);
}

/// Record a command execution with latency.
#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    inc_labels(&COMMAND_COUNTER, &[command]);
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

/// Record a command error.
#[inline]
pub fn record_command_error(command: &str, error: &str) {
    inc_labels(&COMMAND_ERRORS, &[command, error]);
}

#[inline]
pub fn record_accusation(outcome: &str) {
    inc_labels(&ACCUSATIONS, &[outcome]);
}

/// Record a media fetch. `bytes` is only counted for actual downloads.
#[inline]
pub fn record_media(kind: &str, result: &str, bytes: u64) {
    inc_labels(&MEDIA_DOWNLOADS, &[kind, result]);
    if bytes > 0
        && let Some(c) = MEDIA_BYTES.get()
    {
        c.inc_by(bytes);
    }
}

#[inline]
pub fn record_file_cache(tier: &str) {
    inc_labels(&FILE_CACHE_LOOKUPS, &[tier]);
}

#[inline]
pub fn record_feed_cycle(result: &str, new_items: usize) {
    inc_labels(&FEED_CYCLES, &[result]);
    if let Some(c) = FEED_ITEMS.get() {
        c.inc_by(new_items as u64);
    }
}

#[inline]
pub fn set_abuse_pairs(count: usize) {
    if let Some(g) = ABUSE_PAIRS.get() {
        g.set(count as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();
        init();

        record_command("ping", 0.001);
        record_accusation("warned");
        record_media("photo", "downloaded", 42);

        let output = gather_metrics();
        assert!(output.contains("chatlog_command_total"));
        assert!(output.contains("chatlog_flood_accusations_total"));
        assert!(output.contains("chatlog_media_bytes_total"));
    }
}
