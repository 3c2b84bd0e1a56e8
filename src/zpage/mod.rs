//! ## zPage plumbing
//!
//! A zPage is an in-process HTML debug page served by whatever HTTP server
//! the host application already runs. This module carries the handler
//! capability every page implements, plus the query-string helpers a host
//! adapter needs to drive one.

use std::collections::HashMap;
use std::io::Write;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

pub(crate) mod style;
mod tracez_handler;

pub use tracez_handler::TracezZPageHandler;

/// Characters percent-encoded when values are embedded in page links.
/// Everything outside `[A-Za-z0-9_.~-]` is escaped.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Capability set implemented by every zPage.
pub trait ZPageHandler: Send + Sync {
    /// URL path the page is served under.
    fn url_path(&self) -> &'static str;

    /// Render the page selected by `query_map` into `out`.
    ///
    /// Rendering never fails toward the caller. If the sink rejects a write
    /// the page is cut short; the HTTP status has been sent before body
    /// rendering starts, so there is nothing left to signal.
    fn emit_html(&self, query_map: &HashMap<String, String>, out: &mut dyn Write);
}

/// Split a raw query string into single-valued parameters.
///
/// Parameters are separated by `&`; the first `=` splits key from value and
/// a parameter without `=` maps to the empty string. Repeated keys keep the
/// last value. Keys and values are percent-decoded, so links emitted by a
/// page round-trip through this function.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    if query.is_empty() {
        return HashMap::new();
    }
    query
        .split('&')
        .map(|parameter| {
            let (key, value) = parameter.split_once('=').unwrap_or((parameter, ""));
            (
                percent_decode_str(key).decode_utf8_lossy().into_owned(),
                percent_decode_str(value).decode_utf8_lossy().into_owned(),
            )
        })
        .collect()
}

/// Percent-encode a value for inclusion in a page link.
pub(crate) fn url_encode(raw: &str) -> String {
    utf8_percent_encode(raw, QUERY_ENCODE_SET).to_string()
}

/// Escape text for inclusion in an HTML body or attribute value.
pub(crate) fn html_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
