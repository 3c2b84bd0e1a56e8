//! ## Span cache
//!
//! Name-partitioned storage behind the TraceZ page. Every span name seen at
//! least once owns a [`TracezBucket`] holding the spans of that name which
//! are still running, plus bounded FIFO rings of finished samples: one ring
//! per latency bucket for successful spans and one ring per canonical error
//! code for failed spans.
//!
//! The name-to-bucket map is a sharded concurrent map, so producer threads
//! touching different names do not contend, and first sight of a name
//! creates its bucket without a global lock. Mutation of a single bucket
//! happens under that bucket's shard lock; readers obtain clones taken under
//! the same lock, so a span halfway through [`SpanCache::move_to_finished`]
//! is observed either as still running or as finished, never as both.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::Duration;

use dashmap::DashMap;
use opentelemetry::trace::{SpanId, TraceId};
use opentelemetry_sdk::export::trace::SpanData;

use crate::trace::latency::{ErrorCode, LatencyBucket, ERROR_CODE_COUNT, LATENCY_BUCKET_COUNT};

/// Default capacity of each latency sample ring.
pub(crate) const DEFAULT_OK_SAMPLES: usize = 16;

/// Default capacity of each error sample ring.
pub(crate) const DEFAULT_ERROR_SAMPLES: usize = 16;

/// Identity under which a running span is tracked until its end arrives.
type SpanKey = (TraceId, SpanId);

fn span_key(span: &SpanData) -> SpanKey {
    (span.span_context.trace_id(), span.span_context.span_id())
}

/// Duration between a span's start and end, saturating to zero when the
/// clocks disagree.
pub(crate) fn span_latency(span: &SpanData) -> Duration {
    span.end_time
        .duration_since(span.start_time)
        .unwrap_or_default()
}

/// A bounded FIFO of finished span samples. Appending at capacity evicts the
/// oldest sample; iteration is oldest to newest.
#[derive(Clone, Debug)]
pub(crate) struct SpanRing {
    spans: VecDeque<SpanData>,
    capacity: usize,
}

impl SpanRing {
    fn with_capacity(capacity: usize) -> SpanRing {
        SpanRing {
            spans: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, span: SpanData) {
        if self.capacity == 0 {
            return;
        }
        if self.spans.len() == self.capacity {
            self.spans.pop_front();
        }
        self.spans.push_back(span);
    }

    pub(crate) fn len(&self) -> usize {
        self.spans.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &SpanData> {
        self.spans.iter()
    }

    /// Consume the ring, yielding samples oldest to newest.
    pub(crate) fn into_spans(self) -> VecDeque<SpanData> {
        self.spans
    }
}

/// All cached data for one span name.
#[derive(Clone, Debug)]
pub(crate) struct TracezBucket {
    /// Spans that have started but not yet ended.
    pub(crate) running: HashMap<SpanKey, SpanData>,
    /// Finished spans with a successful status, one ring per latency bucket.
    pub(crate) ok: [SpanRing; LATENCY_BUCKET_COUNT],
    /// Finished spans with an error status, one ring per canonical code.
    pub(crate) errors: [SpanRing; ERROR_CODE_COUNT],
}

impl TracezBucket {
    fn new(ok_capacity: usize, error_capacity: usize) -> TracezBucket {
        TracezBucket {
            running: HashMap::new(),
            ok: std::array::from_fn(|_| SpanRing::with_capacity(ok_capacity)),
            errors: std::array::from_fn(|_| SpanRing::with_capacity(error_capacity)),
        }
    }

    /// Total successful samples currently held, across all latency buckets.
    pub(crate) fn ok_count(&self) -> usize {
        self.ok.iter().map(SpanRing::len).sum()
    }

    /// Total error samples currently held, across all codes.
    pub(crate) fn error_count(&self) -> usize {
        self.errors.iter().map(SpanRing::len).sum()
    }
}

/// The shared store mutated by the span processor and read by the
/// aggregator.
#[derive(Debug)]
pub(crate) struct SpanCache {
    buckets: DashMap<String, TracezBucket>,
    ok_capacity: usize,
    error_capacity: usize,
}

impl SpanCache {
    pub(crate) fn new(ok_capacity: usize, error_capacity: usize) -> SpanCache {
        SpanCache {
            buckets: DashMap::new(),
            ok_capacity,
            error_capacity,
        }
    }

    /// Record a span as running.
    pub(crate) fn insert_running(&self, span: SpanData) {
        let name = span.name.to_string();
        let key = span_key(&span);
        self.buckets
            .entry(name)
            .or_insert_with(|| TracezBucket::new(self.ok_capacity, self.error_capacity))
            .running
            .insert(key, span);
    }

    /// Move a span from the running set into exactly one finished ring.
    ///
    /// A span that was never recorded as running (missed start, double end)
    /// still lands in a finished ring; the removal is simply a no-op.
    pub(crate) fn move_to_finished(&self, span: SpanData) {
        let name = span.name.to_string();
        let key = span_key(&span);
        let mut bucket = self
            .buckets
            .entry(name)
            .or_insert_with(|| TracezBucket::new(self.ok_capacity, self.error_capacity));
        bucket.running.remove(&key);
        match ErrorCode::classify(&span.status) {
            Some(code) => bucket.errors[code.ring_index()].push(span),
            None => {
                let bucket_index = LatencyBucket::for_latency(span_latency(&span)).index();
                bucket.ok[bucket_index].push(span);
            }
        }
    }

    /// Every span name seen so far.
    pub(crate) fn span_names(&self) -> BTreeSet<String> {
        self.buckets.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Point-in-time clone of one name's bucket.
    pub(crate) fn bucket_snapshot(&self, name: &str) -> Option<TracezBucket> {
        self.buckets.get(name).map(|bucket| bucket.value().clone())
    }

    /// Point-in-time clone of the whole cache. Each bucket is cloned under
    /// its own lock; consistency is per bucket, not across buckets.
    pub(crate) fn snapshot(&self) -> BTreeMap<String, TracezBucket> {
        self.buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
