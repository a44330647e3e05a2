pub mod blocklist;
pub mod config;
pub mod cursor;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod progress;
pub mod run;
pub mod sink;

pub use blocklist::Blocklist;
pub use config::RunOptions;
pub use cursor::{CursorSource, SourceState};
pub use data::Database;
pub use dispatch::{Dispatcher, RunReport, TaskPool};
pub use error::{DispatchError, StoreError};
pub use progress::{Progress, ProgressSnapshot};
pub use run::{execute_run, run_with};
pub use sink::ResultSink;
