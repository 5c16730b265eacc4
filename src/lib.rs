//! XSMB (northern Vietnam lottery) result acquisition and live polling.

pub mod api;
pub mod config;
pub mod connection;
pub mod database;
pub mod dates;
pub mod error;
pub mod lookup;
pub mod normalizer;
pub mod pipeline;
pub mod polling;
pub mod prediction;
pub mod time;
pub mod types;

pub use error::{Result, XsmbError};
pub use lookup::{LookupPayload, ResultLookup};
pub use pipeline::{AcquisitionPipeline, RetryPolicy};
pub use polling::{FetchOutcome, POLL_INTERVAL, PollState, PollingController};
pub use prediction::{AnalysisResult, AnalyzeStatus, Predictor};
pub use time::{Clock, FixedClock, SystemClock, TimeService};
pub use types::*;
