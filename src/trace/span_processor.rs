//! ## TraceZ span processor
//!
//! The TraceZ processor is an alternative to exporting span processors: the
//! spans it collects never leave the process. On span start it snapshots the
//! span into the running set of the span's name; on span end it moves the
//! finished span into a bounded sample ring selected by status and latency.
//! The collected data is served by the TraceZ page through a
//! [`TracezDataAggregator`].
//!
//! [`TracezDataAggregator`]: crate::TracezDataAggregator

use std::collections::HashMap;
use std::sync::Arc;

use opentelemetry::trace::{SpanContext, TraceResult};
use opentelemetry::Context;
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::trace::{Span, SpanProcessor};

use crate::config::TracezConfig;
use crate::trace::span_cache::{SpanCache, DEFAULT_ERROR_SAMPLES, DEFAULT_OK_SAMPLES};

/// A [`SpanProcessor`] that caches span data in-process for the TraceZ page.
///
/// By default only sampled spans are collected; spans the sampler dropped
/// are invisible to both callbacks. Build one with
/// [`TracezSpanProcessor::builder`] or through [`tracez`].
///
/// Both callbacks run on the thread that started or ended the span. They
/// perform no I/O and touch only the lock shard owning the span's name, so
/// the cost per call stays flat regardless of how many names are cached.
///
/// [`tracez`]: crate::tracez
#[derive(Debug)]
pub struct TracezSpanProcessor {
    cache: Arc<SpanCache>,
    only_sampled: bool,
}

impl TracezSpanProcessor {
    /// Start building a `TracezSpanProcessor`.
    pub fn builder() -> TracezSpanProcessorBuilder {
        TracezSpanProcessorBuilder::default()
    }

    pub(crate) fn cache_handle(&self) -> Arc<SpanCache> {
        Arc::clone(&self.cache)
    }

    fn admit(&self, span_context: &SpanContext) -> bool {
        !self.only_sampled || span_context.is_sampled()
    }
}

impl SpanProcessor for TracezSpanProcessor {
    fn on_start(&self, span: &mut Span, _cx: &Context) {
        // a non-recording span carries no data to snapshot
        if let Some(data) = span.exported_data() {
            if self.admit(&data.span_context) {
                self.cache.insert_running(data);
            }
        }
    }

    fn on_end(&self, span: SpanData) {
        // the sampled flag is immutable, so re-evaluating the filter here
        // matches the admission decision taken at start
        if !self.admit(&span.span_context) {
            return;
        }
        self.cache.move_to_finished(span);
    }

    fn force_flush(&self) -> TraceResult<()> {
        // nothing to flush, the cache never exports
        Ok(())
    }

    fn shutdown(&mut self) -> TraceResult<()> {
        Ok(())
    }
}

/// Builder for [`TracezSpanProcessor`].
#[derive(Clone, Debug)]
pub struct TracezSpanProcessorBuilder {
    config: TracezConfig,
    ok_sample_capacity: usize,
    error_sample_capacity: usize,
}

impl Default for TracezSpanProcessorBuilder {
    fn default() -> Self {
        TracezSpanProcessorBuilder {
            config: TracezConfig::default(),
            ok_sample_capacity: DEFAULT_OK_SAMPLES,
            error_sample_capacity: DEFAULT_ERROR_SAMPLES,
        }
    }
}

impl TracezSpanProcessorBuilder {
    /// Set whether only sampled spans are collected. Defaults to `true`.
    pub fn with_only_sampled(mut self, only_sampled: bool) -> Self {
        self.config.only_sampled = only_sampled;
        self
    }

    /// Capacity of each latency sample ring.
    pub fn with_ok_sample_capacity(mut self, capacity: usize) -> Self {
        self.ok_sample_capacity = capacity;
        self
    }

    /// Capacity of each error sample ring.
    pub fn with_error_sample_capacity(mut self, capacity: usize) -> Self {
        self.error_sample_capacity = capacity;
        self
    }

    /// Apply recognised options from a key/value property source. Unknown
    /// keys are ignored.
    pub fn read_properties(mut self, properties: &HashMap<String, String>) -> Self {
        self.config = self.config.with_properties(properties);
        self
    }

    /// Apply recognised options from the process environment.
    pub fn read_env(mut self) -> Self {
        self.config = self.config.with_env();
        self
    }

    /// Build the processor.
    pub fn build(self) -> TracezSpanProcessor {
        TracezSpanProcessor {
            cache: Arc::new(SpanCache::new(
                self.ok_sample_capacity,
                self.error_sample_capacity,
            )),
            only_sampled: self.config.only_sampled,
        }
    }
}
