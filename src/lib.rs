pub mod config;
pub mod env;
pub mod error;
pub mod record;
pub mod sink;
pub mod span;
pub mod metrics;
pub mod shipper;

#[cfg(feature = "openobserve")]
pub mod openobserve;

pub mod init;
pub mod invocation;
pub mod noop_sink;
pub mod simulate;
pub mod telemetry;
pub mod handler;
