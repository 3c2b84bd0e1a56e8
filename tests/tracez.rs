//! Integration tests driving the TraceZ processor through a real tracer
//! provider, the way a host application would install it.

use std::collections::HashMap;

use opentelemetry::trace::{Span, Status, Tracer, TracerProvider as _};
use opentelemetry_sdk::trace::{Config, Sampler, TracerProvider};
use opentelemetry_tracez::{tracez, TracezZPageHandler, ZPageHandler};

#[test]
fn collects_spans_from_a_tracer_provider() {
    let (processor, aggregator) = tracez();
    let provider = TracerProvider::builder()
        .with_span_processor(processor)
        .build();
    let tracer = provider.tracer("tracez-test");

    let mut running = tracer.start("busy");
    assert_eq!(aggregator.running_span_counts().get("busy"), Some(&1));

    running.end();
    assert!(aggregator.running_span_counts().is_empty());
    let latency_counts = aggregator.span_latency_counts();
    let per_bucket = latency_counts.get("busy").expect("finished span is sampled");
    assert_eq!(per_bucket.iter().sum::<usize>(), 1);

    let mut failing = tracer.start("flaky");
    failing.set_status(Status::error("DEADLINE_EXCEEDED"));
    failing.end();
    assert_eq!(aggregator.error_span_counts().get("flaky"), Some(&1));
    assert_eq!(aggregator.error_spans_by_name("flaky").len(), 1);

    let names: Vec<String> = aggregator.span_names().into_iter().collect();
    assert_eq!(names, vec!["busy".to_string(), "flaky".to_string()]);
}

#[test]
fn running_spans_are_listed_until_they_end() {
    let (processor, aggregator) = tracez();
    let provider = TracerProvider::builder()
        .with_span_processor(processor)
        .build();
    let tracer = provider.tracer("tracez-test");

    let spans: Vec<_> = (0..3).map(|_| tracer.start("one")).collect();
    assert_eq!(aggregator.running_span_counts().get("one"), Some(&3));
    assert_eq!(aggregator.running_spans_by_name("one").len(), 3);

    for mut span in spans {
        span.end();
    }
    assert!(aggregator.running_span_counts().is_empty());
    let latency_counts = aggregator.span_latency_counts();
    assert_eq!(
        latency_counts.get("one").map(|b| b.iter().sum::<usize>()),
        Some(3)
    );
}

#[test]
fn unsampled_spans_never_reach_the_page() {
    let (processor, aggregator) = tracez();
    let provider = TracerProvider::builder()
        .with_span_processor(processor)
        .with_config(Config::default().with_sampler(Sampler::AlwaysOff))
        .build();
    let tracer = provider.tracer("tracez-test");

    let mut span = tracer.start("invisible");
    span.end();
    assert!(aggregator.span_names().is_empty());
}

#[test]
fn page_renders_collected_spans() {
    let (processor, aggregator) = tracez();
    let provider = TracerProvider::builder()
        .with_span_processor(processor)
        .build();
    let tracer = provider.tracer("tracez-test");
    let mut span = tracer.start("render me");
    span.end();

    let handler = TracezZPageHandler::new(Some(aggregator));
    assert_eq!(handler.url_path(), "/tracez");

    let mut body = Vec::new();
    handler.emit_html(&HashMap::new(), &mut body);
    let page = String::from_utf8(body).expect("page is valid utf-8");
    assert!(page.contains("<title>TraceZ</title>"));
    assert!(page.contains("render me"));
}
