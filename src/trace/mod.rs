//! TraceZ span collection and aggregation.

use thiserror::Error;

mod aggregator;
mod latency;
pub(crate) mod span_cache;
mod span_processor;

pub use aggregator::TracezDataAggregator;
pub use latency::{ErrorCode, LatencyBucket, ERROR_CODE_COUNT, LATENCY_BUCKET_COUNT};
pub use span_processor::{TracezSpanProcessor, TracezSpanProcessorBuilder};

/// Create a span processor and its aggregator with default configuration.
///
/// Install the processor in the host's `TracerProvider` and hand the
/// aggregator to a [`TracezZPageHandler`].
///
/// [`TracezZPageHandler`]: crate::TracezZPageHandler
pub fn tracez() -> (TracezSpanProcessor, TracezDataAggregator) {
    let processor = TracezSpanProcessor::builder().build();
    let aggregator = TracezDataAggregator::new(&processor);
    (processor, aggregator)
}

/// Errors raised while rendering the TraceZ page.
///
/// None of these cross the SDK boundary; the page handler resolves them
/// internally.
#[derive(Debug, Error)]
pub enum TracezError {
    /// The output sink rejected a write; rendering stops.
    #[error(transparent)]
    Sink(#[from] std::io::Error),
    /// `ztype` did not name a sample type; the drill-down is omitted.
    #[error("unknown sample type: {0}")]
    UnknownSampleType(String),
    /// `zsubtype` was outside the selected sample type's range; the
    /// drill-down is omitted.
    #[error("sample subtype out of range: {0}")]
    OutOfRangeSubtype(String),
}

#[cfg(test)]
pub(crate) mod testing {
    use std::borrow::Cow;
    use std::time::{Duration, SystemTime};

    use opentelemetry::trace::{
        SpanContext, SpanId, SpanKind, Status, TraceFlags, TraceId, TraceState,
    };
    use opentelemetry_sdk::export::trace::SpanData;
    use opentelemetry_sdk::trace::EvictedQueue;
    use opentelemetry_sdk::Resource;

    /// Fixed start instant so rendered timestamps are deterministic:
    /// 2020-09-13T12:26:40Z.
    pub(crate) fn base_time() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000)
    }

    fn make_span(name: &str, id: u64, sampled: bool) -> SpanData {
        let flags = if sampled {
            TraceFlags::SAMPLED
        } else {
            TraceFlags::default()
        };
        SpanData {
            span_context: SpanContext::new(
                TraceId::from(id as u128),
                SpanId::from(id),
                flags,
                false,
                TraceState::default(),
            ),
            parent_span_id: SpanId::INVALID,
            span_kind: SpanKind::Internal,
            name: Cow::Owned(name.to_string()),
            start_time: base_time(),
            end_time: base_time(),
            attributes: Vec::new(),
            dropped_attributes_count: 0,
            events: EvictedQueue::new(u32::MAX),
            links: EvictedQueue::new(u32::MAX),
            status: Status::Unset,
            resource: Cow::Owned(Resource::empty()),
            instrumentation_lib: Default::default(),
        }
    }

    /// A sampled span that has started but not ended.
    pub(crate) fn running_span(name: &str, id: u64) -> SpanData {
        make_span(name, id, true)
    }

    /// A sampled span that ended successfully after `latency`.
    pub(crate) fn ended_span(name: &str, id: u64, latency: Duration) -> SpanData {
        let mut span = make_span(name, id, true);
        span.end_time = span.start_time + latency;
        span
    }

    /// An unsampled span that ended successfully after `latency`.
    pub(crate) fn unsampled_span_data(name: &str, id: u64, latency: Duration) -> SpanData {
        let mut span = make_span(name, id, false);
        span.end_time = span.start_time + latency;
        span
    }

    /// A sampled span that ended with the given error description.
    pub(crate) fn error_span(name: &str, id: u64, description: &str) -> SpanData {
        let mut span = make_span(name, id, true);
        span.end_time = span.start_time + Duration::from_micros(5);
        span.status = Status::error(description.to_string());
        span
    }
}
