// Prometheus metrics for the execution service

use crucible_common::types::ExecutionReport;
use crucible_engine::LanguageRegistry;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};
use tracing::error;

lazy_static! {
    pub static ref EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "crucible_executions_total",
        "Executions by language and verdict",
        &["language", "verdict"]
    )
    .expect("register crucible_executions_total");

    pub static ref EXECUTION_DURATION: HistogramVec = register_histogram_vec!(
        "crucible_execution_duration_seconds",
        "Wall time of a whole execution",
        &["language"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("register crucible_execution_duration_seconds");

    pub static ref FIRST_SOLVES_TOTAL: IntCounter = register_int_counter!(
        "crucible_first_solves_total",
        "Submissions that earned points"
    )
    .expect("register crucible_first_solves_total");
}

fn verdict(report: &ExecutionReport) -> &'static str {
    if report.is_successful {
        "accepted"
    } else if report.test_results.is_empty() {
        "rejected"
    } else {
        "failed"
    }
}

/// Label for names the registry does not know
pub const UNSUPPORTED_LANGUAGE: &str = "unsupported";

/// Canonical language name, so the label set is bounded by the registry
fn language_label<'a>(registry: &'a LanguageRegistry, language: &str) -> &'a str {
    registry
        .get(language)
        .map_or(UNSUPPORTED_LANGUAGE, |spec| spec.name.as_str())
}

pub fn observe_execution(registry: &LanguageRegistry, language: &str, report: &ExecutionReport) {
    let language = language_label(registry, language);
    EXECUTIONS_TOTAL
        .with_label_values(&[language, verdict(report)])
        .inc();
    EXECUTION_DURATION
        .with_label_values(&[language])
        .observe(report.execution_time_ms as f64 / 1000.0);
}

/// Text exposition of every registered metric
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_labels() {
        let rejected = ExecutionReport::failure("No test cases provided", 0);
        assert_eq!(verdict(&rejected), "rejected");

        let accepted = ExecutionReport {
            is_successful: true,
            ..ExecutionReport::failure("", 1)
        };
        assert_eq!(verdict(&accepted), "accepted");
    }

    #[test]
    fn test_language_label_uses_canonical_name() {
        let registry = LanguageRegistry::builtin();
        assert_eq!(language_label(&registry, " PY "), "python");
        assert_eq!(language_label(&registry, "c#"), "csharp");
        assert_eq!(language_label(&registry, "brainfuck"), UNSUPPORTED_LANGUAGE);
    }

    #[test]
    fn test_render_includes_observed_execution() {
        let registry = LanguageRegistry::builtin();
        observe_execution(&registry, "Python", &ExecutionReport::failure("Language x is not supported", 2));
        let text = render();
        assert!(text.contains("crucible_executions_total"));
        assert!(text.contains("language=\"python\""));
    }

    #[test]
    fn test_unknown_languages_share_one_series() {
        let registry = LanguageRegistry::builtin();
        for name in ["junk-lang-0", "junk-lang-1", "JUNK-LANG-2"] {
            observe_execution(&registry, name, &ExecutionReport::failure("Language is not supported", 1));
        }

        let text = render();
        assert!(!text.to_lowercase().contains("junk-lang"));
        assert!(text.contains("language=\"unsupported\",verdict=\"rejected\""));
    }
}
