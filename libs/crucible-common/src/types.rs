use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One input/expected-output pair used to judge a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(rename = "Input", alias = "input")]
    pub input: String,
    #[serde(
        rename = "ExpectedOutput",
        alias = "expected_output",
        alias = "expectedOutput"
    )]
    pub expected_output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestStatus {
    Passed,
    Failed,
    RuntimeError,
    TimeLimitExceeded,
    CompilationError,
    InternalError,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::RuntimeError => "runtime_error",
            TestStatus::TimeLimitExceeded => "time_limit_exceeded",
            TestStatus::CompilationError => "compilation_error",
            TestStatus::InternalError => "internal_error",
        };
        write!(f, "{}", label)
    }
}

/// Outcome of running a single test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    pub status: TestStatus,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
}

/// Aggregated verdict for one submission evaluation
///
/// `is_successful` is only true when at least one test case ran and every
/// test case passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub is_successful: bool,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub test_results: Vec<TestCaseResult>,
}

impl ExecutionReport {
    /// Report-level failure: nothing was evaluated
    pub fn failure(message: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            is_successful: false,
            error_message: Some(message.into()),
            execution_time_ms,
            test_results: Vec::new(),
        }
    }

    pub fn from_results(test_results: Vec<TestCaseResult>, execution_time_ms: u64) -> Self {
        let is_successful = !test_results.is_empty() && test_results.iter().all(|r| r.passed);
        Self {
            is_successful,
            error_message: None,
            execution_time_ms,
            test_results,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.test_results.iter().filter(|r| r.passed).count()
    }

    pub fn total_count(&self) -> usize {
        self.test_results.len()
    }
}

/// Challenge as supplied by the persistence layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: u64,
    pub title: String,
    /// Raw serialized test cases, decoded by the engine
    pub test_cases: String,
    pub points: u32,
    /// Empty means every registered language is accepted
    #[serde(default)]
    pub allowed_languages: Vec<String>,
}

impl Challenge {
    pub fn accepts_language(&self, language: &str) -> bool {
        self.allowed_languages.is_empty()
            || self
                .allowed_languages
                .iter()
                .any(|allowed| allowed.trim().eq_ignore_ascii_case(language.trim()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub id: Uuid,
    pub user_id: String,
    pub challenge_id: u64,
    pub language: String,
    pub code: String,
    pub submitted_at: DateTime<Utc>,
    pub is_successful: bool,
    pub execution_time_ms: u64,
    pub error_message: Option<String>,
    pub points_earned: u32,
}

/// Persisted form of a single TestCaseResult
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub solution_id: Uuid,
    pub user_id: String,
    pub challenge_id: u64,
    pub status: TestStatus,
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn from_test_result(solution: &Solution, result: &TestCaseResult) -> Self {
        Self {
            solution_id: solution.id,
            user_id: solution.user_id.clone(),
            challenge_id: solution.challenge_id,
            status: result.status,
            input: result.input.clone(),
            expected_output: result.expected_output.clone(),
            actual_output: result.actual_output.clone(),
            error_message: result.error_message.clone(),
            execution_time_ms: result.execution_time_ms,
            created_at: solution.submitted_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_score: u64,
    pub solved_challenges: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub solution: Solution,
    pub report: ExecutionReport,
    /// True when this submission was the user's first successful solve
    pub first_solve: bool,
}
