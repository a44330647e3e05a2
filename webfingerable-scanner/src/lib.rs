pub mod error;
pub mod prober;
pub mod result;

pub use error::{FailureKind, ScanError};
pub use prober::{AccountLedger, Fetch, Probe, ProbeConfig, Prober};
pub use result::{NOT_ATTEMPTED, ProbeJob, ProbeResult, ProbeStatus};
