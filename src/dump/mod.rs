//! Report output for the profiler's collections.
//!
//! - [`text`]: the human-readable report written by `on_dump`
//! - [`structured`]: serde structs mirroring every collection, written as JSON

pub mod structured;
pub mod text;

pub use structured::PerformanceStats;
pub use text::percentage;
