use crucible_common::codec::CodecError;
use crucible_common::types::TestStatus;
use thiserror::Error;

/// Every way an execution can fail
///
/// Report-level kinds (malformed data, unknown language, oversized source)
/// abort the whole run; the rest are recorded against a single test case.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    MalformedTestCaseData(#[from] CodecError),

    #[error("No test cases provided")]
    NoTestCases,

    #[error("Language {0} is not supported")]
    UnsupportedLanguage(String),

    #[error("Language {0} is not implemented yet")]
    NotImplemented(String),

    #[error("Source code exceeds maximum size of {limit} bytes")]
    SourceTooLarge { limit: usize },

    #[error("Test input exceeds maximum size of {limit} bytes")]
    InputTooLarge { limit: usize },

    #[error("Compilation failed: {0}")]
    CompilationError(String),

    #[error("Code execution timed out")]
    TimedOut,

    #[error("Failed to start '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", exit_message(.code, .stderr))]
    NonZeroExit {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_message(code: &Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    match code {
        Some(code) => format!("Process exited with status {}", code),
        None => "Process terminated by signal".to_string(),
    }
}

impl ExecutionError {
    /// Status recorded for a test case that failed with this error
    pub fn test_status(&self) -> TestStatus {
        match self {
            ExecutionError::TimedOut => TestStatus::TimeLimitExceeded,
            ExecutionError::CompilationError(_) => TestStatus::CompilationError,
            ExecutionError::NonZeroExit { .. } => TestStatus::RuntimeError,
            _ => TestStatus::InternalError,
        }
    }

    /// Whether this error fails the run before any test case executes
    pub fn is_report_level(&self) -> bool {
        matches!(
            self,
            ExecutionError::MalformedTestCaseData(_)
                | ExecutionError::NoTestCases
                | ExecutionError::UnsupportedLanguage(_)
                | ExecutionError::NotImplemented(_)
                | ExecutionError::SourceTooLarge { .. }
        )
    }
}
