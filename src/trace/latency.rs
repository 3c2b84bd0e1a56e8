//! ## Latency buckets and error codes
//!
//! Finished spans with a successful status are sampled into nine fixed
//! latency buckets; finished spans with an error status are sampled into one
//! ring per canonical error code. Both enumerations are referenced by
//! integer ordinal from the page's query parameters.

use std::time::Duration;

use opentelemetry::trace::Status;

/// Number of latency buckets used to sample successful spans.
pub const LATENCY_BUCKET_COUNT: usize = 9;

/// Number of error rings, one per canonical non-OK status code.
pub const ERROR_CODE_COUNT: usize = 16;

/// Lower bounds of the latency buckets, in ascending order.
const LATENCY_BUCKET_BOUNDS: [Duration; LATENCY_BUCKET_COUNT] = [
    Duration::from_micros(0),
    Duration::from_micros(10),
    Duration::from_micros(100),
    Duration::from_millis(1),
    Duration::from_millis(10),
    Duration::from_millis(100),
    Duration::from_secs(1),
    Duration::from_secs(10),
    Duration::from_secs(100),
];

/// One of the nine half-open intervals `[lo, hi)` partitioning the latency
/// axis.
///
/// A finished span with `Ok` status falls into exactly one bucket based on
/// its end-to-start duration; a latency equal to a bucket's lower bound
/// belongs to that bucket. The variant order is part of the page's URL
/// contract (`zsubtype` selects buckets by index), so reordering variants is
/// a breaking change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LatencyBucket {
    /// `[0, 10µs)`
    Zero,
    /// `[10µs, 100µs)`
    Micros10,
    /// `[100µs, 1ms)`
    Micros100,
    /// `[1ms, 10ms)`
    Millis1,
    /// `[10ms, 100ms)`
    Millis10,
    /// `[100ms, 1s)`
    Millis100,
    /// `[1s, 10s)`
    Seconds1,
    /// `[10s, 100s)`
    Seconds10,
    /// `[100s, +∞)`
    Seconds100,
}

impl LatencyBucket {
    /// All buckets in ordinal order.
    pub const ALL: [LatencyBucket; LATENCY_BUCKET_COUNT] = [
        LatencyBucket::Zero,
        LatencyBucket::Micros10,
        LatencyBucket::Micros100,
        LatencyBucket::Millis1,
        LatencyBucket::Millis10,
        LatencyBucket::Millis100,
        LatencyBucket::Seconds1,
        LatencyBucket::Seconds10,
        LatencyBucket::Seconds100,
    ];

    /// Ordinal of this bucket, `0..=8`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The bucket with the given ordinal, if any.
    pub fn from_index(index: usize) -> Option<LatencyBucket> {
        LatencyBucket::ALL.get(index).copied()
    }

    /// Lower and upper bound of this bucket. The interval is half-open; the
    /// last bucket's upper bound is [`Duration::MAX`].
    pub fn bounds(self) -> (Duration, Duration) {
        let index = self.index();
        let upper = LATENCY_BUCKET_BOUNDS
            .get(index + 1)
            .copied()
            .unwrap_or(Duration::MAX);
        (LATENCY_BUCKET_BOUNDS[index], upper)
    }

    /// The bucket containing the given latency.
    pub fn for_latency(latency: Duration) -> LatencyBucket {
        for index in 1..LATENCY_BUCKET_BOUNDS.len() {
            if latency < LATENCY_BUCKET_BOUNDS[index] {
                return LatencyBucket::ALL[index - 1];
            }
        }
        LatencyBucket::ALL[LATENCY_BUCKET_COUNT - 1]
    }

    /// Column heading used in the summary table.
    pub fn heading(self) -> &'static str {
        match self {
            LatencyBucket::Zero => ">0us",
            LatencyBucket::Micros10 => ">10us",
            LatencyBucket::Micros100 => ">100us",
            LatencyBucket::Millis1 => ">1ms",
            LatencyBucket::Millis10 => ">10ms",
            LatencyBucket::Millis100 => ">100ms",
            LatencyBucket::Seconds1 => ">1s",
            LatencyBucket::Seconds10 => ">10s",
            LatencyBucket::Seconds100 => ">100s",
        }
    }
}

/// Canonical non-OK status codes, in canonical ordinal order.
///
/// Each code owns one sample ring per span name. On the page, `zsubtype`
/// references codes by ordinal (`0` means all codes), so reordering variants
/// is a breaking change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The operation was cancelled.
    Cancelled = 1,
    /// Unknown error, also the fallback for unrecognised codes.
    Unknown = 2,
    /// The client specified an invalid argument.
    InvalidArgument = 3,
    /// The deadline expired before the operation could complete.
    DeadlineExceeded = 4,
    /// A requested entity was not found.
    NotFound = 5,
    /// The entity the operation attempted to create already exists.
    AlreadyExists = 6,
    /// The caller lacks permission to execute the operation.
    PermissionDenied = 7,
    /// A resource (quota, disk space, ...) has been exhausted.
    ResourceExhausted = 8,
    /// The system is not in a state required for the operation.
    FailedPrecondition = 9,
    /// The operation was aborted.
    Aborted = 10,
    /// The operation was attempted past the valid range.
    OutOfRange = 11,
    /// The operation is not implemented or supported.
    Unimplemented = 12,
    /// An internal invariant was broken.
    Internal = 13,
    /// The service is currently unavailable.
    Unavailable = 14,
    /// Unrecoverable data loss or corruption.
    DataLoss = 15,
    /// The request lacks valid authentication credentials.
    Unauthenticated = 16,
}

impl ErrorCode {
    /// All codes in ordinal order.
    pub const ALL: [ErrorCode; ERROR_CODE_COUNT] = [
        ErrorCode::Cancelled,
        ErrorCode::Unknown,
        ErrorCode::InvalidArgument,
        ErrorCode::DeadlineExceeded,
        ErrorCode::NotFound,
        ErrorCode::AlreadyExists,
        ErrorCode::PermissionDenied,
        ErrorCode::ResourceExhausted,
        ErrorCode::FailedPrecondition,
        ErrorCode::Aborted,
        ErrorCode::OutOfRange,
        ErrorCode::Unimplemented,
        ErrorCode::Internal,
        ErrorCode::Unavailable,
        ErrorCode::DataLoss,
        ErrorCode::Unauthenticated,
    ];

    /// Canonical ordinal of this code, `1..=16`.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// The code with the given `zsubtype` ordinal. `0` selects all codes and
    /// maps to `None` here; out-of-range ordinals have no code at all.
    pub fn from_subtype(subtype: usize) -> Option<ErrorCode> {
        subtype
            .checked_sub(1)
            .and_then(|index| ErrorCode::ALL.get(index).copied())
    }

    /// Index of this code's sample ring, `0..=15`.
    pub(crate) fn ring_index(self) -> usize {
        self.ordinal() - 1
    }

    /// Classify a span status. `None` means the span is not an error and is
    /// sampled by latency instead.
    ///
    /// The SDK's [`Status`] carries no structured code, so the description of
    /// an error status is matched against the canonical code names; anything
    /// unrecognised falls back to [`ErrorCode::Unknown`].
    pub(crate) fn classify(status: &Status) -> Option<ErrorCode> {
        match status {
            Status::Error { description } => Some(ErrorCode::from_description(description)),
            Status::Ok | Status::Unset => None,
        }
    }

    fn from_description(description: &str) -> ErrorCode {
        let normalized: String = description
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "cancelled" => ErrorCode::Cancelled,
            "unknown" => ErrorCode::Unknown,
            "invalidargument" => ErrorCode::InvalidArgument,
            "deadlineexceeded" => ErrorCode::DeadlineExceeded,
            "notfound" => ErrorCode::NotFound,
            "alreadyexists" => ErrorCode::AlreadyExists,
            "permissiondenied" => ErrorCode::PermissionDenied,
            "resourceexhausted" => ErrorCode::ResourceExhausted,
            "failedprecondition" => ErrorCode::FailedPrecondition,
            "aborted" => ErrorCode::Aborted,
            "outofrange" => ErrorCode::OutOfRange,
            "unimplemented" => ErrorCode::Unimplemented,
            "internal" => ErrorCode::Internal,
            "unavailable" => ErrorCode::Unavailable,
            "dataloss" => ErrorCode::DataLoss,
            "unauthenticated" => ErrorCode::Unauthenticated,
            _ => ErrorCode::Unknown,
        }
    }
}
