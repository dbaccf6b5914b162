//! Generate replay command implementation.
//!
//! Writes a synthetic replay JSON file that `run --replay-file` can play back.

use anyhow::Context;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use perf_profiler::generate_replay;

/// Generates `polls` random polls for `packages` and writes them to `output`.
pub fn command_generate(output: PathBuf, polls: usize, packages: &[String]) -> anyhow::Result<()> {
    debug!(
        "Generating replay: polls={}, packages={}, output={}",
        polls,
        packages.len(),
        output.display()
    );

    let replay = generate_replay(polls, packages);

    // Write to file as pretty-printed JSON
    let json_content = serde_json::to_string_pretty(&replay)?;
    fs::write(&output, &json_content)
        .with_context(|| format!("Failed to write replay file {}", output.display()))?;

    println!(
        "✅ Generated replay: {} polls for {} packages in {}",
        replay.polls.len(),
        packages.len(),
        output.display()
    );

    Ok(())
}
