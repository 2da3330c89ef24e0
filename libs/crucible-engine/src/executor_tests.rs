/// End-to-end tests for the execution orchestrator
///
/// These run real child processes through the full pipeline:
/// 1. Correct programs pass every test case, in order
/// 2. Timeouts are enforced and reported per test case
/// 3. Runtime and compilation failures are told apart
/// 4. Report-level failures never spawn anything
/// 5. Scratch directories are gone once `execute` returns
///
/// Fixture languages are `sh` based so only a POSIX shell is required.

#[cfg(all(test, unix))]
mod orchestrator_tests {
    use crate::backend::{LanguageRegistry, LanguageSpec};
    use crate::executor::Executor;
    use crucible_common::codec;
    use crucible_common::config::ExecutionConfig;
    use crucible_common::types::{TestCase, TestStatus};
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const SUM_PROGRAM: &str = "read a\nread b\necho $((a + b))\n";

    /// Registry of shell-backed fixture languages
    fn fixture_registry() -> LanguageRegistry {
        LanguageRegistry::from_specs(vec![
            LanguageSpec::interpreted("shell", "sh", &["{source}"], "sh").with_aliases(&["sh"]),
            LanguageSpec::compiled(
                "compiled-shell",
                ("cp", &["{source}", "{binary}"]),
                ("sh", &["{binary}"]),
                "sh",
            ),
            LanguageSpec::compiled(
                "broken",
                ("sh", &["-c", "echo 'main.sh:1: syntax error' >&2; exit 1"]),
                ("sh", &["{binary}"]),
                "sh",
            ),
            LanguageSpec::interpreted("ghost", "crucible-no-such-interpreter", &["{source}"], "gh"),
            LanguageSpec::unimplemented("csharp", "cs").with_aliases(&["c#"]),
        ])
        .expect("fixture registry is valid")
    }

    /// Executor whose scratch directories land in a private temp root
    fn fixture_executor(timeout_ms: u64) -> (Executor, TempDir) {
        let root = tempfile::tempdir().expect("Failed to create scratch root");
        let config = ExecutionConfig::default()
            .with_timeout_ms(timeout_ms)
            .with_scratch_root(root.path());
        (Executor::new(fixture_registry(), config), root)
    }

    fn scratch_entries(root: &Path) -> usize {
        std::fs::read_dir(root).map(|entries| entries.count()).unwrap_or(0)
    }

    fn sum_test_cases() -> String {
        codec::encode(&[TestCase::new("2\n3", "5"), TestCase::new("10\n20", "30")])
    }

    /// Test: the seeded sum challenge passes with results in order
    #[tokio::test]
    async fn test_sum_program_passes() {
        let (executor, root) = fixture_executor(5000);

        let report = executor.execute(SUM_PROGRAM, "shell", &sum_test_cases()).await;

        assert!(report.is_successful, "report: {:?}", report);
        assert!(report.error_message.is_none());
        assert_eq!(report.total_count(), 2);
        assert_eq!(report.passed_count(), 2);
        assert_eq!(report.test_results[0].input, "2\n3");
        assert_eq!(report.test_results[0].actual_output, "5");
        assert_eq!(report.test_results[1].input, "10\n20");
        assert_eq!(report.test_results[1].actual_output, "30");
        assert_eq!(scratch_entries(root.path()), 0);
    }

    /// Test: a sleeping program is cut off near the time budget
    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let (executor, root) = fixture_executor(300);
        let raw = codec::encode(&[TestCase::new("", "never")]);
        let start = Instant::now();

        let report = executor.execute("sleep 5\necho never\n", "shell", &raw).await;

        assert!(start.elapsed() < Duration::from_secs(3), "execute hung after timeout");
        assert!(!report.is_successful);
        assert_eq!(report.total_count(), 1);

        let result = &report.test_results[0];
        assert!(!result.passed);
        assert_eq!(result.status, TestStatus::TimeLimitExceeded);
        assert_eq!(result.error_message.as_deref(), Some("Code execution timed out"));
        assert_eq!(scratch_entries(root.path()), 0);
    }

    /// Test: output comparison ignores case and surrounding whitespace
    #[tokio::test]
    async fn test_case_insensitive_match() {
        let (executor, _root) = fixture_executor(5000);
        let raw = codec::encode(&[TestCase::new("", "true")]);

        let report = executor.execute("echo '  True'\n", "SHELL", &raw).await;

        assert!(report.is_successful);
        assert_eq!(report.test_results[0].actual_output, "True");
    }

    /// Test: results come back in input order, one per test case
    #[tokio::test]
    async fn test_results_keep_input_order() {
        let (executor, _root) = fixture_executor(5000);
        let raw = codec::encode(&[
            TestCase::new("alpha", "alpha"),
            TestCase::new("beta", "gamma"),
            TestCase::new("delta", "delta"),
        ]);

        let report = executor.execute("cat\n", "sh", &raw).await;

        assert!(!report.is_successful);
        let statuses: Vec<TestStatus> = report.test_results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![TestStatus::Passed, TestStatus::Failed, TestStatus::Passed]);
        let inputs: Vec<&str> = report.test_results.iter().map(|r| r.input.as_str()).collect();
        assert_eq!(inputs, vec!["alpha", "beta", "delta"]);
        assert_eq!(report.test_results[1].actual_output, "beta");
    }

    /// Test: non-zero exit becomes a runtime error carrying stderr
    #[tokio::test]
    async fn test_runtime_error() {
        let (executor, _root) = fixture_executor(5000);
        let raw = codec::encode(&[TestCase::new("", "1")]);

        let report = executor.execute("echo boom >&2\nexit 3\n", "shell", &raw).await;

        let result = &report.test_results[0];
        assert!(!report.is_successful);
        assert_eq!(result.status, TestStatus::RuntimeError);
        assert_eq!(result.error_message.as_deref(), Some("boom"));
    }

    /// Test: a missing interpreter is an internal error, not a crash
    #[tokio::test]
    async fn test_missing_interpreter() {
        let (executor, root) = fixture_executor(5000);
        let raw = codec::encode(&[TestCase::new("", "1"), TestCase::new("", "2")]);

        let report = executor.execute("anything", "ghost", &raw).await;

        assert!(!report.is_successful);
        assert_eq!(report.total_count(), 2);
        assert!(report
            .test_results
            .iter()
            .all(|r| r.status == TestStatus::InternalError));
        assert_eq!(scratch_entries(root.path()), 0);
    }

    /// Test: compiled backends build and then run the artifact
    #[tokio::test]
    async fn test_compiled_language_runs() {
        let (executor, root) = fixture_executor(5000);

        let report = executor
            .execute(SUM_PROGRAM, "compiled-shell", &sum_test_cases())
            .await;

        assert!(report.is_successful, "report: {:?}", report);
        assert_eq!(scratch_entries(root.path()), 0);
    }

    /// Test: compiler failures are reported distinctly from runtime errors
    #[tokio::test]
    async fn test_compilation_error() {
        let (executor, root) = fixture_executor(5000);

        let report = executor.execute(SUM_PROGRAM, "broken", &sum_test_cases()).await;

        assert!(!report.is_successful);
        for result in &report.test_results {
            assert_eq!(result.status, TestStatus::CompilationError);
            assert_eq!(
                result.error_message.as_deref(),
                Some("Compilation failed: main.sh:1: syntax error")
            );
        }
        assert_eq!(scratch_entries(root.path()), 0);
    }

    /// Test: report-level failures leave no scratch behind
    #[tokio::test]
    async fn test_report_level_failures() {
        let (executor, root) = fixture_executor(5000);

        let report = executor.execute(SUM_PROGRAM, "shell", "not json").await;
        assert!(!report.is_successful);
        assert!(report
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Malformed test case data"));

        let report = executor.execute(SUM_PROGRAM, "fortran", &sum_test_cases()).await;
        assert_eq!(report.error_message.as_deref(), Some("Language fortran is not supported"));

        let report = executor.execute(SUM_PROGRAM, "C#", &sum_test_cases()).await;
        assert_eq!(
            report.error_message.as_deref(),
            Some("Language csharp is not implemented yet")
        );

        let report = executor.execute(SUM_PROGRAM, "shell", "[]").await;
        assert_eq!(report.error_message.as_deref(), Some("No test cases provided"));

        assert!(report.test_results.is_empty());
        assert_eq!(scratch_entries(root.path()), 0);
    }

    /// Test: concurrent executions do not share scratch state
    #[tokio::test]
    async fn test_concurrent_executions() {
        let (executor, root) = fixture_executor(5000);
        let raw = sum_test_cases();

        let (a, b) = tokio::join!(
            executor.execute(SUM_PROGRAM, "shell", &raw),
            executor.execute(SUM_PROGRAM, "compiled-shell", &raw),
        );

        assert!(a.is_successful);
        assert!(b.is_successful);
        assert_eq!(scratch_entries(root.path()), 0);
    }

    /// Test: the seeded challenge against a real Python interpreter
    #[tokio::test]
    #[ignore] // Requires python3 on PATH
    async fn test_python_sum_challenge() {
        let root = tempfile::tempdir().unwrap();
        let config = ExecutionConfig::default().with_scratch_root(root.path());
        let executor = Executor::new(LanguageRegistry::builtin(), config);

        let code = "a = int(input())\nb = int(input())\nprint(a + b)\n";
        let report = executor.execute(code, "python", &sum_test_cases()).await;

        assert!(report.is_successful, "report: {:?}", report);
        assert_eq!(report.passed_count(), 2);
    }
}
