//! ## The TraceZ page
//!
//! Renders the summary table of cached span counts and, when a drill-down
//! is requested through the query parameters, the detail listing of one
//! name's running, latency-sampled or error-sampled spans.

use std::collections::HashMap;
use std::io::{self, Write};

use chrono::{DateTime, Datelike, Timelike, Utc};
use opentelemetry::global;
use opentelemetry::trace::{Event, Status, TraceError};
use opentelemetry::{Key, Value};
use opentelemetry_sdk::export::trace::SpanData;

use crate::trace::span_cache::span_latency;
use crate::trace::{ErrorCode, LatencyBucket, TracezDataAggregator, TracezError};
use crate::zpage::{html_escape, style, url_encode, ZPageHandler};

/// Query parameter selecting the span name to drill into.
const PARAM_SPAN_NAME: &str = "zspanname";
/// Query parameter selecting the sample type: 0 running, 1 latency, 2 error.
const PARAM_SAMPLE_TYPE: &str = "ztype";
/// Query parameter selecting the bucket within the sample type: for latency
/// samples a bucket ordinal in `[0, 8]`, for error samples a code ordinal in
/// `[0, 16]` where 0 means all codes.
const PARAM_SAMPLE_SUB_TYPE: &str = "zsubtype";

const TRACEZ_URL: &str = "/tracez";

/// Background for every other summary row.
const ZEBRA_STRIPE_COLOR: &str = "#f0f0f0";
/// Trace id color for sampled spans.
const SAMPLED_TRACE_ID_COLOR: &str = "#C1272D";
/// Trace id color for unsampled spans.
const NOT_SAMPLED_TRACE_ID_COLOR: &str = "black";

const LOGO_URL: &str =
    "https://opentelemetry.io/img/logos/opentelemetry-horizontal-color.png";
const FAVICON_URL: &str = "https://opentelemetry.io/favicon.png";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SampleType {
    Running,
    Latency,
    Error,
}

impl SampleType {
    fn from_query(value: &str) -> Result<SampleType, TracezError> {
        match value.trim().parse::<i64>() {
            Ok(0) => Ok(SampleType::Running),
            Ok(1) => Ok(SampleType::Latency),
            Ok(2) => Ok(SampleType::Error),
            _ => Err(TracezError::UnknownSampleType(value.to_owned())),
        }
    }

    fn value(self) -> usize {
        match self {
            SampleType::Running => 0,
            SampleType::Latency => 1,
            SampleType::Error => 2,
        }
    }

    fn count_label(self) -> &'static str {
        match self {
            SampleType::Running => "running",
            SampleType::Latency => "latency samples",
            SampleType::Error => "error samples",
        }
    }
}

/// The `/tracez` page handler.
///
/// Built with an aggregator under normal operation; a handler built with
/// `None` renders a fallback message instead of span data, which lets a host
/// register the page before tracing is wired up.
#[derive(Clone, Debug)]
pub struct TracezZPageHandler {
    aggregator: Option<TracezDataAggregator>,
}

impl TracezZPageHandler {
    /// Create the page handler.
    pub fn new(aggregator: Option<TracezDataAggregator>) -> Self {
        TracezZPageHandler { aggregator }
    }

    fn emit_page(
        &self,
        query_map: &HashMap<String, String>,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        out.write_all(b"<!DOCTYPE html>")?;
        out.write_all(b"<html lang=\"en\">")?;
        out.write_all(b"<head>")?;
        out.write_all(b"<meta charset=\"UTF-8\">")?;
        write!(
            out,
            "<link rel=\"shortcut icon\" href=\"{FAVICON_URL}\" type=\"image/png\">"
        )?;
        out.write_all(
            b"<link href=\"https://fonts.googleapis.com/css?family=Open+Sans:300\" rel=\"stylesheet\">",
        )?;
        out.write_all(
            b"<link href=\"https://fonts.googleapis.com/css?family=Roboto\" rel=\"stylesheet\">",
        )?;
        out.write_all(b"<title>TraceZ</title>")?;
        write!(out, "<style>{}</style>", style::ZPAGE_CSS)?;
        out.write_all(b"</head>")?;
        out.write_all(b"<body>")?;
        match self.emit_body(query_map, out) {
            Ok(()) => {}
            Err(TracezError::Sink(err)) => return Err(err),
            Err(err) => write!(out, "Error while generating HTML: {err}")?,
        }
        out.write_all(b"</body>")?;
        out.write_all(b"</html>")?;
        out.flush()
    }

    fn emit_body(
        &self,
        query_map: &HashMap<String, String>,
        out: &mut dyn Write,
    ) -> Result<(), TracezError> {
        let aggregator = match &self.aggregator {
            Some(aggregator) => aggregator,
            None => {
                out.write_all(b"OpenTelemetry implementation not available.")?;
                return Ok(());
            }
        };
        write!(out, "<img style=\"height: 90px;\" src=\"{LOGO_URL}\" />")?;
        out.write_all(b"<h1>TraceZ Summary</h1>")?;
        emit_summary_table(aggregator, out)?;

        let span_name = match query_map.get(PARAM_SPAN_NAME) {
            Some(name) => name,
            None => return Ok(()),
        };
        let type_value = match query_map.get(PARAM_SAMPLE_TYPE) {
            Some(value) => value,
            None => return Ok(()),
        };
        match emit_details(
            aggregator,
            span_name,
            type_value,
            query_map.get(PARAM_SAMPLE_SUB_TYPE).map(String::as_str),
            out,
        ) {
            Ok(()) => Ok(()),
            Err(TracezError::Sink(err)) => Err(TracezError::Sink(err)),
            // bad ztype or zsubtype: the drill-down is omitted
            Err(_) => Ok(()),
        }
    }
}

impl ZPageHandler for TracezZPageHandler {
    fn url_path(&self) -> &'static str {
        TRACEZ_URL
    }

    fn emit_html(&self, query_map: &HashMap<String, String>, out: &mut dyn Write) {
        if let Err(err) = self.emit_page(query_map, out) {
            global::handle_error(TraceError::from(format!("tracez page: {err}")));
        }
    }
}

fn emit_summary_table(
    aggregator: &TracezDataAggregator,
    out: &mut dyn Write,
) -> Result<(), TracezError> {
    out.write_all(b"<table style=\"border-spacing: 0; border: 1px solid #363636;\">")?;
    emit_summary_header(out)?;

    let span_names = aggregator.span_names();
    let running_counts = aggregator.running_span_counts();
    let latency_counts = aggregator.span_latency_counts();
    let error_counts = aggregator.error_span_counts();

    let mut zebra_stripe = false;
    for span_name in &span_names {
        if zebra_stripe {
            write!(out, "<tr style=\"background-color: {ZEBRA_STRIPE_COLOR}\">")?;
        } else {
            out.write_all(b"<tr>")?;
        }
        zebra_stripe = !zebra_stripe;
        write!(out, "<td>{}</td>", html_escape(span_name))?;

        let running = running_counts.get(span_name).copied().unwrap_or(0);
        // subtype is ignored for running spans
        emit_summary_cell(out, span_name, running as i64, SampleType::Running, 0)?;

        let per_bucket = latency_counts.get(span_name);
        for bucket in LatencyBucket::ALL {
            let count = per_bucket.map_or(0, |counts| counts[bucket.index()]);
            emit_summary_cell(out, span_name, count as i64, SampleType::Latency, bucket.index())?;
        }

        let errors = error_counts.get(span_name).copied().unwrap_or(0);
        // subtype 0 means all error codes
        emit_summary_cell(out, span_name, errors as i64, SampleType::Error, 0)?;
        out.write_all(b"</tr>")?;
    }
    out.write_all(b"</table>")?;
    Ok(())
}

fn emit_summary_header(out: &mut dyn Write) -> io::Result<()> {
    out.write_all(b"<tr class=\"bg-color\">")?;
    out.write_all(b"<th colspan=1 class=\"header-text\"><b>Span Name</b></th>")?;
    out.write_all(b"<th colspan=1 class=\"header-text border-left-white\"><b>Running</b></th>")?;
    out.write_all(
        b"<th colspan=9 class=\"header-text border-left-white\"><b>Latency Samples</b></th>",
    )?;
    out.write_all(
        b"<th colspan=1 class=\"header-text border-left-white\"><b>Error Samples</b></th>",
    )?;
    out.write_all(b"</tr>")?;

    out.write_all(b"<tr class=\"bg-color\">")?;
    out.write_all(b"<th colspan=1></th>")?;
    out.write_all(b"<th colspan=1 class=\"border-left-white\"></th>")?;
    for bucket in LatencyBucket::ALL {
        write!(
            out,
            "<th colspan=1 class=\"border-left-white align-center\" style=\"color: #fff;\"><b>[{}]</b></th>",
            bucket.heading()
        )?;
    }
    out.write_all(b"<th colspan=1 class=\"border-left-white\"></th>")?;
    out.write_all(b"</tr>")
}

/// One numeric cell of the summary table. Positive counts link to the
/// matching drill-down, zero renders as plain text and negative sentinels as
/// `N/A`.
fn emit_summary_cell(
    out: &mut dyn Write,
    span_name: &str,
    count: i64,
    sample_type: SampleType,
    subtype: usize,
) -> io::Result<()> {
    if count > 0 {
        write!(
            out,
            "<td class=\"align-center border-left-dark\"><a href=\"?{}={}&{}={}&{}={}\">{}</a></td>",
            PARAM_SPAN_NAME,
            url_encode(span_name),
            PARAM_SAMPLE_TYPE,
            sample_type.value(),
            PARAM_SAMPLE_SUB_TYPE,
            subtype,
            count
        )
    } else if count < 0 {
        out.write_all(b"<td class=\"align-center border-left-dark\">N/A</td>")
    } else {
        out.write_all(b"<td class=\"align-center border-left-dark\">0</td>")
    }
}

fn emit_details(
    aggregator: &TracezDataAggregator,
    span_name: &str,
    type_value: &str,
    subtype_value: Option<&str>,
    out: &mut dyn Write,
) -> Result<(), TracezError> {
    let sample_type = SampleType::from_query(type_value)?;
    let spans: Option<Vec<SpanData>> = match sample_type {
        SampleType::Running => {
            let mut running = aggregator.running_spans_by_name(span_name);
            running.sort_by_key(|span| span.start_time);
            Some(running)
        }
        SampleType::Latency => match subtype_value {
            Some(subtype_value) => {
                let bucket = LatencyBucket::from_index(parse_subtype(subtype_value)?)
                    .ok_or_else(|| TracezError::OutOfRangeSubtype(subtype_value.to_owned()))?;
                let (lower, upper) = bucket.bounds();
                let mut finished = aggregator.ok_spans(span_name, lower, upper);
                sort_newest_first(&mut finished);
                Some(finished)
            }
            None => None,
        },
        SampleType::Error => match subtype_value {
            Some(subtype_value) => {
                let subtype = parse_subtype(subtype_value)?;
                let code = if subtype == 0 {
                    None
                } else {
                    Some(ErrorCode::from_subtype(subtype).ok_or_else(|| {
                        TracezError::OutOfRangeSubtype(subtype_value.to_owned())
                    })?)
                };
                let mut errors = aggregator.error_spans_by_name(span_name);
                if let Some(code) = code {
                    errors.retain(|span| ErrorCode::classify(&span.status) == Some(code));
                }
                sort_newest_first(&mut errors);
                Some(errors)
            }
            None => None,
        },
    };

    out.write_all(b"<h2>Span Details</h2>")?;
    emit_span_name_and_count(
        out,
        span_name,
        spans.as_ref().map_or(0, Vec::len),
        sample_type,
    )?;
    if let Some(spans) = spans {
        emit_span_details(out, sample_type, &spans)?;
    }
    Ok(())
}

fn parse_subtype(value: &str) -> Result<usize, TracezError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| TracezError::OutOfRangeSubtype(value.to_owned()))
}

fn sort_newest_first(spans: &mut [SpanData]) {
    spans.sort_by(|a, b| {
        b.end_time
            .cmp(&a.end_time)
            .then_with(|| b.start_time.cmp(&a.start_time))
    });
}

fn emit_span_name_and_count(
    out: &mut dyn Write,
    span_name: &str,
    count: usize,
    sample_type: SampleType,
) -> io::Result<()> {
    write!(
        out,
        "<p class=\"align-center\"><b> Span Name: {} </b></p>",
        html_escape(span_name)
    )?;
    write!(
        out,
        "<p class=\"align-center\"><b> Number of {}: {} </b></p>",
        sample_type.count_label(),
        count
    )
}

fn emit_span_details(
    out: &mut dyn Write,
    sample_type: SampleType,
    spans: &[SpanData],
) -> io::Result<()> {
    out.write_all(b"<pre>\n")?;
    writeln!(out, "{:<23} {:>18}", "When", "Elapsed(s)")?;
    out.write_all(b"-------------------------------------------\n")?;
    for span in spans {
        emit_single_span(out, span, sample_type != SampleType::Running)?;
    }
    out.write_all(b"</pre>\n")
}

fn emit_single_span(out: &mut dyn Write, span: &SpanData, ended: bool) -> io::Result<()> {
    let start: DateTime<Utc> = span.start_time.into();
    let elapsed = if ended {
        format!("{:13.6}", span_latency(span).as_secs_f64())
    } else {
        " ".repeat(13)
    };
    let trace_id_color = if span.span_context.is_sampled() {
        SAMPLED_TRACE_ID_COLOR
    } else {
        NOT_SAMPLED_TRACE_ID_COLOR
    };
    writeln!(
        out,
        "<b>{} {}     TraceId: <b style=\"color:{};\">{}</b> SpanId: {} ParentSpanId: {}</b>",
        format_timestamp(&start),
        elapsed,
        trace_id_color,
        span.span_context.trace_id(),
        span.span_context.span_id(),
        span.parent_span_id,
    )?;

    let mut events: Vec<&Event> = span.events.iter().collect();
    events.sort_by_key(|event| event.timestamp);

    let mut last_day = (start.year(), start.ordinal());
    let mut last_time = span.start_time;
    for event in events {
        // Durations below one second print left-padded with blanks instead
        // of '0' characters:
        //     0.000534  ->  .   534
        //     1.000534  ->  1.000534
        let delta_micros = event
            .timestamp
            .duration_since(last_time)
            .unwrap_or_default()
            .as_micros();
        let delta = if delta_micros >= 1_000_000 {
            format!("{:.6}", delta_micros as f64 / 1_000_000.0)
        } else {
            format!(".{delta_micros:6}")
        };

        let timestamp: DateTime<Utc> = event.timestamp.into();
        let day = (timestamp.year(), timestamp.ordinal());
        if day == last_day {
            write!(out, "{:11}", "")?;
        } else {
            write!(
                out,
                "{:04}/{:02}/{:02}-",
                timestamp.year(),
                timestamp.month(),
                timestamp.day()
            )?;
            last_day = day;
        }
        writeln!(
            out,
            "{:02}:{:02}:{:02}.{:06} {:>13} ... {}",
            timestamp.hour(),
            timestamp.minute(),
            timestamp.second(),
            timestamp.timestamp_subsec_micros(),
            delta,
            html_escape(&render_event(event)),
        )?;
        last_time = event.timestamp;
    }

    writeln!(out, "{:44} {}", "", html_escape(&render_status(&span.status)))?;
    writeln!(
        out,
        "{:44} {}",
        "",
        html_escape(&render_attributes(span.resource.iter()))
    )
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    format!(
        "{:04}/{:02}/{:02}-{:02}:{:02}:{:02}.{:06}",
        timestamp.year(),
        timestamp.month(),
        timestamp.day(),
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second(),
        timestamp.timestamp_subsec_micros()
    )
}

fn render_status(status: &Status) -> String {
    match status {
        Status::Unset => "Status{Unset}".to_string(),
        Status::Ok => "Status{Ok}".to_string(),
        Status::Error { description } => format!("Status{{Error, description={description}}}"),
    }
}

fn render_attributes<'a>(attributes: impl Iterator<Item = (&'a Key, &'a Value)>) -> String {
    let mut rendered = String::from("Attributes:{");
    for (index, (key, value)) in attributes.enumerate() {
        if index > 0 {
            rendered.push_str(", ");
        }
        rendered.push_str(&format!("{key}={value}"));
    }
    rendered.push('}');
    rendered
}

fn render_event(event: &Event) -> String {
    let mut rendered = event.name.to_string();
    if !event.attributes.is_empty() {
        rendered.push(' ');
        rendered.push_str(&render_attributes(
            event
                .attributes
                .iter()
                .map(|attribute| (&attribute.key, &attribute.value)),
        ));
    }
    rendered
}
