//! ## TraceZ data aggregator
//!
//! Pure queries over the span cache for the TraceZ page. Every operation
//! scans the cache once and returns freshly allocated results; nothing here
//! mutates state. Each result is consistent with some state the cache held
//! while the call ran; consecutive calls may observe different states.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use opentelemetry_sdk::export::trace::SpanData;

use crate::trace::span_cache::{span_latency, SpanCache};
use crate::trace::span_processor::TracezSpanProcessor;
use crate::trace::LATENCY_BUCKET_COUNT;

/// Read-side companion of a [`TracezSpanProcessor`].
///
/// Aggregators are cheap handles onto the processor's cache; clone one per
/// page handler or query site as needed.
#[derive(Clone, Debug)]
pub struct TracezDataAggregator {
    cache: Arc<SpanCache>,
}

impl TracezDataAggregator {
    /// Create an aggregator reading the cache `processor` feeds.
    pub fn new(processor: &TracezSpanProcessor) -> Self {
        TracezDataAggregator {
            cache: processor.cache_handle(),
        }
    }

    /// Every span name the cache has seen, running or finished.
    pub fn span_names(&self) -> BTreeSet<String> {
        self.cache.span_names()
    }

    /// Number of currently running spans per name. Names with no running
    /// span are omitted.
    pub fn running_span_counts(&self) -> HashMap<String, usize> {
        self.cache
            .snapshot()
            .into_iter()
            .filter(|(_, bucket)| !bucket.running.is_empty())
            .map(|(name, bucket)| (name, bucket.running.len()))
            .collect()
    }

    /// Currently running spans with the given name.
    pub fn running_spans_by_name(&self, span_name: &str) -> Vec<SpanData> {
        self.cache
            .bucket_snapshot(span_name)
            .map(|bucket| bucket.running.into_values().collect())
            .unwrap_or_default()
    }

    /// Per-bucket counts of successfully finished spans, per name. Names
    /// with no successful sample are omitted.
    pub fn span_latency_counts(&self) -> HashMap<String, [usize; LATENCY_BUCKET_COUNT]> {
        let mut counts = HashMap::new();
        for (name, bucket) in self.cache.snapshot() {
            if bucket.ok_count() > 0 {
                let mut per_bucket = [0usize; LATENCY_BUCKET_COUNT];
                for (index, ring) in bucket.ok.iter().enumerate() {
                    per_bucket[index] = ring.len();
                }
                counts.insert(name, per_bucket);
            }
        }
        counts
    }

    /// Counts of successfully finished spans whose latency falls in
    /// `[lower, upper)`, per name. Names with no matching span are omitted.
    pub fn span_latency_counts_in_range(
        &self,
        lower: Duration,
        upper: Duration,
    ) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for (name, bucket) in self.cache.snapshot() {
            let matching = bucket
                .ok
                .iter()
                .flat_map(|ring| ring.iter())
                .filter(|span| in_range(span, lower, upper))
                .count();
            if matching > 0 {
                counts.insert(name, matching);
            }
        }
        counts
    }

    /// Successfully finished spans with the given name and a latency in
    /// `[lower, upper)`.
    pub fn ok_spans(&self, span_name: &str, lower: Duration, upper: Duration) -> Vec<SpanData> {
        self.cache
            .bucket_snapshot(span_name)
            .map(|bucket| {
                bucket
                    .ok
                    .into_iter()
                    .flat_map(|ring| ring.into_spans())
                    .filter(|span| in_range(span, lower, upper))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of finished error spans per name, across all error codes.
    /// Names with no error sample are omitted.
    pub fn error_span_counts(&self) -> HashMap<String, usize> {
        self.cache
            .snapshot()
            .into_iter()
            .filter(|(_, bucket)| bucket.error_count() > 0)
            .map(|(name, bucket)| (name, bucket.error_count()))
            .collect()
    }

    /// Finished error spans with the given name, across all error codes.
    pub fn error_spans_by_name(&self, span_name: &str) -> Vec<SpanData> {
        self.cache
            .bucket_snapshot(span_name)
            .map(|bucket| {
                bucket
                    .errors
                    .into_iter()
                    .flat_map(|ring| ring.into_spans())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn in_range(span: &SpanData, lower: Duration, upper: Duration) -> bool {
    let latency = span_latency(span);
    lower <= latency && latency < upper
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::latency::LatencyBucket;
    use crate::trace::testing::{ended_span, error_span, running_span};
    use crate::trace::TracezSpanProcessor;
    use opentelemetry_sdk::trace::SpanProcessor;

    fn processor_and_aggregator() -> (TracezSpanProcessor, TracezDataAggregator) {
        let processor = TracezSpanProcessor::builder().build();
        let aggregator = TracezDataAggregator::new(&processor);
        (processor, aggregator)
    }

    #[test]
    fn empty_cache_yields_empty_results() {
        let (_processor, aggregator) = processor_and_aggregator();
        assert!(aggregator.span_names().is_empty());
        assert!(aggregator.running_span_counts().is_empty());
        assert!(aggregator.span_latency_counts().is_empty());
        assert!(aggregator.error_span_counts().is_empty());
        assert!(aggregator.running_spans_by_name("one").is_empty());
        assert!(aggregator.error_spans_by_name("one").is_empty());
    }

    #[test]
    fn counts_three_running_spans_of_one_name() {
        let (processor, aggregator) = processor_and_aggregator();
        for id in 1..=3 {
            processor.cache_handle().insert_running(running_span("one", id));
        }
        let counts = aggregator.running_span_counts();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get("one"), Some(&3));
        assert_eq!(aggregator.running_spans_by_name("one").len(), 3);
    }

    #[test]
    fn latency_counts_land_in_matching_buckets() {
        let (processor, aggregator) = processor_and_aggregator();
        processor.on_end(ended_span("x", 1, Duration::from_nanos(500)));
        processor.on_end(ended_span("x", 2, Duration::from_micros(10)));
        processor.on_end(ended_span("x", 3, Duration::from_millis(100)));

        let counts = aggregator.span_latency_counts();
        let per_bucket = counts.get("x").unwrap();
        let mut expected = [0usize; LATENCY_BUCKET_COUNT];
        expected[LatencyBucket::Zero.index()] = 1;
        expected[LatencyBucket::Micros10.index()] = 1;
        expected[LatencyBucket::Millis100.index()] = 1;
        assert_eq!(per_bucket, &expected);
        assert_eq!(per_bucket.iter().sum::<usize>(), 3);
    }

    #[test]
    fn range_counts_respect_half_open_bounds() {
        let (processor, aggregator) = processor_and_aggregator();
        processor.on_end(ended_span("y", 1, Duration::from_micros(10)));
        processor.on_end(ended_span("y", 2, Duration::from_micros(99)));
        processor.on_end(ended_span("y", 3, Duration::from_micros(100)));

        let counts = aggregator
            .span_latency_counts_in_range(Duration::from_micros(10), Duration::from_micros(100));
        assert_eq!(counts.get("y"), Some(&2));

        let spans =
            aggregator.ok_spans("y", Duration::from_micros(10), Duration::from_micros(100));
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn error_counts_cover_all_codes() {
        let (processor, aggregator) = processor_and_aggregator();
        processor.on_end(error_span("z", 1, "ABORTED"));
        processor.on_end(error_span("z", 2, "something odd"));

        assert_eq!(aggregator.error_span_counts().get("z"), Some(&2));
        assert_eq!(aggregator.error_spans_by_name("z").len(), 2);
        assert!(aggregator.span_latency_counts().get("z").is_none());
    }

    #[test]
    fn names_union_running_and_finished() {
        let (processor, aggregator) = processor_and_aggregator();
        processor.cache_handle().insert_running(running_span("alpha", 1));
        processor.on_end(ended_span("beta", 2, Duration::from_micros(1)));
        let names: Vec<String> = aggregator.span_names().into_iter().collect();
        assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
    }
}
