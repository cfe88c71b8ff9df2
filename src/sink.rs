use crate::error::SinkError;
use crate::record::LogRecord;
use async_trait::async_trait;

/// Asynchronous destination for [`LogRecord`]s produced by the shipper.
///
/// Implementations are responsible for transporting records to a concrete
/// backend (OpenObserve, stdout, a test double, etc). The shipper calls
/// `send` once per emission and swallows whatever it returns.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single log record to the underlying backend.
    ///
    /// **Parameters**
    /// - `record`: fully-populated [`LogRecord`] built by the shipper.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted by the backend.
    /// - `Err(..)` if the backend failed (network error, serialization
    ///   error, HTTP status, etc.). Nothing retries: the record is gone
    ///   after this call either way.
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Short backend name used in span attributes and local logs.
    fn name(&self) -> &'static str;
}
