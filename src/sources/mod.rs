//! Stat sources that do not read `/proc`.
//!
//! - [`replay`]: plays back recorded polls from a JSON file
//! - [`generate`]: produces random but plausible polls for testing

pub mod generate;
pub mod replay;

pub use generate::generate_replay;
pub use replay::{load_replay_file, RecordedPoll, ReplayFile, ReplaySource, SourceError};
