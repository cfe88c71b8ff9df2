use std::error::Error;

/// Failure returned by a [`LogSink`](crate::sink::LogSink).
///
/// The shipper never propagates these; they end up in the local log and
/// on the shipping span.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("sink responded with status {status}: {body}")]
    Http { status: u16, body: String },

    #[cfg(feature = "openobserve")]
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to encode log record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Fault raised by a simulated business operation.
#[derive(thiserror::Error, Debug)]
pub enum OperationError {
    #[error("{operation} failed: {reason}")]
    Failed {
        operation: &'static str,
        reason: String,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("global subscriber already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Error decoding an invocation payload handed to the local driver.
#[derive(thiserror::Error, Debug)]
pub enum InvocationError {
    #[error("failed to read event: {0}")]
    Read(#[from] std::io::Error),

    #[error("event is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Render an error and its `source()` chain, one cause per line.
///
/// Used wherever a "traceback" is expected: exception span events and
/// `error_traceback` log metadata.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
