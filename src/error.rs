//! Error types returned by the profiler.

/// Failure of a profiler operation. None of these leave the profiler in a
/// partially updated state.
#[derive(Debug, thiserror::Error)]
pub enum ProfilerError {
    /// One or both stat sources were dropped by their owner.
    #[error("Invalid data collectors: {0}")]
    UnavailableCollector(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot initialize {0} more than once")]
    AlreadyInitialized(&'static str),

    /// Writing a dump section failed. Output already written stays written.
    #[error("Failed to dump the {section} report: {source}")]
    Dump {
        section: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize performance stats: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ProfilerError {
    pub(crate) fn dump(section: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| ProfilerError::Dump { section, source }
    }
}
