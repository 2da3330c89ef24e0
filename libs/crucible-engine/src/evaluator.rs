/// Single Test-Case Evaluator
///
/// **Core Responsibility:**
/// Run one test case through the backend and judge the captured output.
///
/// **Normalization Rules (Applied to All Languages):**
/// - Trim leading and trailing whitespace: YES
/// - Ignore newline differences (\n vs \r\n): YES (via trim)
/// - Case sensitivity: NO ("True" matches "true")
/// - Internal whitespace: preserved
///
/// Never fails: every problem becomes a non-passing `TestCaseResult`.

use crate::backend::{self, LanguageSpec};
use crate::error::ExecutionError;
use crate::runner::{ProcessOutput, ProcessRunner};
use crucible_common::config::ExecutionConfig;
use crucible_common::types::{TestCase, TestCaseResult, TestStatus};
use std::time::Instant;
use tracing::{debug, instrument};

pub fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Trimmed, case-insensitive equality
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    let actual = normalize_output(actual);
    let expected = normalize_output(expected);

    actual
        .chars()
        .flat_map(char::to_lowercase)
        .eq(expected.chars().flat_map(char::to_lowercase))
}

/// Run `code` against a single test case
#[instrument(skip(code, spec, test_case, config), fields(language = %spec.name))]
pub async fn evaluate(
    code: &str,
    spec: &LanguageSpec,
    test_case: &TestCase,
    config: &ExecutionConfig,
) -> TestCaseResult {
    let start = Instant::now();
    let outcome = run_test_case(code, spec, test_case, config).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let result = judge(outcome, test_case, elapsed_ms);

    debug!(
        status = %result.status,
        execution_time_ms = result.execution_time_ms,
        "Test case evaluated"
    );

    result
}

async fn run_test_case(
    code: &str,
    spec: &LanguageSpec,
    test_case: &TestCase,
    config: &ExecutionConfig,
) -> Result<ProcessOutput, ExecutionError> {
    if test_case.input.len() > config.max_input_bytes {
        return Err(ExecutionError::InputTooLarge {
            limit: config.max_input_bytes,
        });
    }

    // Scratch directory lives exactly as long as this call
    let program = backend::prepare(spec, code, config).await?;
    let runner = ProcessRunner::new(config.timeout(), config.max_output_bytes);

    runner.run(program.invocation(), &test_case.input).await
}

/// Turn a raw run outcome into a verdict
fn judge(
    outcome: Result<ProcessOutput, ExecutionError>,
    test_case: &TestCase,
    execution_time_ms: u64,
) -> TestCaseResult {
    let (actual_output, status, error_message) = match outcome {
        Ok(output) => {
            let status = if outputs_match(&output.stdout, &test_case.expected_output) {
                TestStatus::Passed
            } else {
                TestStatus::Failed
            };
            (normalize_output(&output.stdout).to_string(), status, None)
        }
        Err(e) => {
            let actual = match &e {
                ExecutionError::NonZeroExit { stdout, .. } => normalize_output(stdout).to_string(),
                _ => String::new(),
            };
            (actual, e.test_status(), Some(e.to_string()))
        }
    };

    TestCaseResult {
        input: test_case.input.clone(),
        expected_output: test_case.expected_output.clone(),
        actual_output,
        passed: status == TestStatus::Passed,
        status,
        error_message,
        execution_time_ms,
    }
}
