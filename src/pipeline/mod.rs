//! The digest pipeline and its stages.
//!
//! - `diff`: Detect new and changed pages against the snapshot
//! - `rank`: Order by priority and truncate
//! - `format`: Render the digest message
//! - `digest`: Run all stages as one transaction

pub mod diff;
pub mod digest;
pub mod format;
pub mod rank;

pub use diff::{DiffResult, DiffSummary, calculate_diff, diff};
pub use digest::{DigestOutcome, DigestPipeline, RunStats};
pub use format::{DigestFormatter, DigestMessage, NO_NEW_CONTENT};
pub use rank::{rank, truncate};
