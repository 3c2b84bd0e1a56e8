//! TraceZ zPage for OpenTelemetry
//!
//! # Overview
//! zPages are an in-process alternative to external exporters. When included,
//! they collect and aggregate tracing information in the background; this
//! data is served on web pages when requested.
//!
//! The TraceZ page shows, per span name, how many spans are currently
//! running, how finished spans distribute over nine latency buckets, and how
//! many spans ended with an error status, with a drill-down into the sampled
//! spans of each cell. No data leaves the process; users bring their own
//! HTTP server and register the page handler with it.
//!
//! # Getting started
//! Create the span processor together with its aggregator and install the
//! processor in the [`TracerProvider`]:
//!
//! ```no_run
//! use opentelemetry::global;
//! use opentelemetry_sdk::trace::TracerProvider;
//! use opentelemetry_tracez::{tracez, TracezZPageHandler, ZPageHandler};
//!
//! let (processor, aggregator) = tracez();
//! let provider = TracerProvider::builder()
//!     .with_span_processor(processor)
//!     .build();
//! global::set_tracer_provider(provider);
//!
//! let handler = TracezZPageHandler::new(Some(aggregator));
//! // Register `handler` with an HTTP server at `handler.url_path()`; per
//! // request, parse the query string with `opentelemetry_tracez::parse_query`
//! // and call `handler.emit_html(&query_map, &mut response_body)`.
//! ```
//!
//! Once the processor is installed it records spans as they start and end.
//!
//! [`TracerProvider`]: opentelemetry_sdk::trace::TracerProvider
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![allow(elided_lifetimes_in_paths)]
#![cfg_attr(
    docsrs,
    feature(doc_cfg, doc_auto_cfg),
    deny(rustdoc::broken_intra_doc_links)
)]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/open-telemetry/opentelemetry-rust/main/assets/logo.svg"
)]
#![cfg_attr(test, deny(warnings))]

mod config;
mod trace;
mod zpage;

pub use config::TracezConfig;
pub use trace::{
    tracez, ErrorCode, LatencyBucket, TracezDataAggregator, TracezError, TracezSpanProcessor,
    TracezSpanProcessorBuilder, ERROR_CODE_COUNT, LATENCY_BUCKET_COUNT,
};
pub use zpage::{parse_query, TracezZPageHandler, ZPageHandler};
