//! Closed-scalp reporting.
//!
//! Every closed scalp produces one `ScalpReport`, fanned out by the
//! `Reporter` to:
//! - a CSV file (always)
//! - the SQLite store (`persistence`), when configured
//! - a remote collector over HTTP, when configured

mod csv;
mod remote;
mod report;
mod sink;

pub use csv::CsvReportWriter;
pub use remote::RemoteCollector;
pub use report::{ScalpReport, REPORT_FIELDS};
pub use sink::{MemorySink, ReportSink, Reporter};
