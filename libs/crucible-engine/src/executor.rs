/// Execution Orchestrator - the engine's single entry point
///
/// **Flow:**
/// 1. Reject oversized source
/// 2. Decode the test-case set (malformed or empty fails the whole run)
/// 3. Resolve the language backend
/// 4. Evaluate every test case sequentially, in decoded order
/// 5. Aggregate into one `ExecutionReport`
///
/// Nothing escapes `execute`: errors and panics are folded into the report.

use crate::backend::LanguageRegistry;
use crate::error::ExecutionError;
use crate::evaluator;
use crucible_common::codec;
use crucible_common::config::ExecutionConfig;
use crucible_common::types::{ExecutionReport, TestCaseResult};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error during execution";

/// Cheap to clone; clones share the registry and configuration
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<LanguageRegistry>,
    config: Arc<ExecutionConfig>,
}

impl Executor {
    pub fn new(registry: LanguageRegistry, config: ExecutionConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }

    /// Languages from the default config file, limits from CRUCIBLE_* variables
    pub fn from_env() -> Self {
        Self::new(LanguageRegistry::load_default(), ExecutionConfig::from_env())
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run `code` against every test case in `raw_test_cases`
    #[instrument(
        skip(self, code, language, raw_test_cases),
        fields(execution_id = %Uuid::new_v4(), language = %language)
    )]
    pub async fn execute(&self, code: &str, language: &str, raw_test_cases: &str) -> ExecutionReport {
        let start = Instant::now();

        let outcome = AssertUnwindSafe(self.run_all(code, language, raw_test_cases))
            .catch_unwind()
            .await;

        let elapsed_ms = start.elapsed().as_millis() as u64;

        let report = match outcome {
            Ok(Ok(results)) => ExecutionReport::from_results(results, elapsed_ms),
            Ok(Err(e)) if e.is_report_level() => {
                warn!(error = %e, "Execution rejected before running tests");
                ExecutionReport::failure(e.to_string(), elapsed_ms)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Execution aborted");
                ExecutionReport::failure(e.to_string(), elapsed_ms)
            }
            Err(_) => {
                error!("Panic while evaluating submission");
                ExecutionReport::failure(INTERNAL_ERROR_MESSAGE, elapsed_ms)
            }
        };

        info!(
            success = report.is_successful,
            passed = report.passed_count(),
            total = report.total_count(),
            execution_time_ms = report.execution_time_ms,
            "Execution finished"
        );

        report
    }

    async fn run_all(
        &self,
        code: &str,
        language: &str,
        raw_test_cases: &str,
    ) -> Result<Vec<TestCaseResult>, ExecutionError> {
        if code.len() > self.config.max_source_bytes {
            return Err(ExecutionError::SourceTooLarge {
                limit: self.config.max_source_bytes,
            });
        }

        let test_cases = codec::decode(raw_test_cases)?;
        if test_cases.is_empty() {
            return Err(ExecutionError::NoTestCases);
        }

        let spec = self.registry.resolve(language)?;

        debug!(
            backend = %spec.name,
            test_count = test_cases.len(),
            compiled = spec.is_compiled(),
            "Running test cases"
        );

        let mut results = Vec::with_capacity(test_cases.len());
        for (index, test_case) in test_cases.iter().enumerate() {
            let result = evaluator::evaluate(code, spec, test_case, &self.config).await;
            debug!(test = index + 1, status = %result.status, "Test case finished");
            results.push(result);
        }

        Ok(results)
    }
}
