//! Server log ingestion: decoding ([`LogRecord`]) and piping ([`LogProxy`]).

mod proxy;
mod record;

pub use proxy::{IngestStats, LogProxy, MAX_LINE_BYTES};
pub use record::{LogRecord, Severity};
