use crate::error::SinkError;
use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;

/// Accepts every record and discards it.
///
/// The shipping span still ends OK, so the load demo measures the full
/// instrumentation path minus the network round trip.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _record: &LogRecord) -> Result<(), SinkError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
