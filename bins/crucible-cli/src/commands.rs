// CLI commands for running submissions and managing language backends
use anyhow::{bail, Context, Result};
use crucible_common::codec;
use crucible_common::config::ExecutionConfig;
use crucible_common::types::{Challenge, ExecutionReport, TestStatus};
use crucible_engine::backend::{
    CompileStep, LanguageExecution, LanguagesFile, BINARY_PLACEHOLDER, SOURCE_PLACEHOLDER,
};
use crucible_engine::{Executor, LanguageRegistry, LanguageSpec};
use std::fs;
use std::path::Path;

/// Run a source file against a test-case file with the local engine
pub async fn run_submission(
    lang: &str,
    source: &Path,
    tests: &Path,
    timeout_ms: Option<u64>,
) -> Result<()> {
    let code = fs::read_to_string(source)
        .with_context(|| format!("Failed to read source file {}", source.display()))?;
    let raw_tests = fs::read_to_string(tests)
        .with_context(|| format!("Failed to read test file {}", tests.display()))?;

    let mut config = ExecutionConfig::from_env();
    if let Some(timeout_ms) = timeout_ms {
        config = config.with_timeout_ms(timeout_ms);
    }

    let executor = Executor::new(LanguageRegistry::load_default(), config);

    println!("🚀 Running {} as {}", source.display(), lang);
    let report = executor.execute(&code, lang, &raw_tests).await;
    print_report(&report);

    if !report.is_successful {
        bail!("Submission did not pass");
    }

    Ok(())
}

fn print_report(report: &ExecutionReport) {
    if let Some(message) = &report.error_message {
        println!("\n❌ {}", message);
        return;
    }

    println!();
    for (index, result) in report.test_results.iter().enumerate() {
        let marker = if result.passed { "✓" } else { "✗" };
        println!(
            "  {} Test {} → {} ({} ms)",
            marker,
            index + 1,
            result.status,
            result.execution_time_ms
        );

        match result.status {
            TestStatus::Passed => {}
            TestStatus::Failed => {
                println!("    Expected: \"{}\"", result.expected_output.trim());
                println!("    Got:      \"{}\"", result.actual_output);
            }
            _ => {
                if let Some(message) = &result.error_message {
                    println!("    {}", message);
                }
            }
        }
    }

    println!(
        "\n{} Passed {}/{} in {} ms",
        if report.is_successful { "✅" } else { "❌" },
        report.passed_count(),
        report.total_count(),
        report.execution_time_ms
    );
}

/// Print the configured languages, or the builtin set if the file is absent
pub fn list_languages(config: &Path) -> Result<()> {
    let registry = if config.exists() {
        LanguageRegistry::load(config)?
    } else {
        println!("⚠️  {} not found, showing builtin languages\n", config.display());
        LanguageRegistry::builtin()
    };

    println!("📋 Configured Languages:\n");
    println!("{:<12} {:<10} {:<10} {:<12} {:<20}", "NAME", "VERSION", "COMPILED", "STATUS", "ALIASES");
    println!("{}", "─".repeat(70));

    for spec in registry.specs() {
        println!(
            "{:<12} {:<10} {:<10} {:<12} {:<20}",
            spec.name,
            spec.version.as_deref().unwrap_or("-"),
            if spec.is_compiled() { "yes" } else { "no" },
            if spec.implemented { "ready" } else { "unavailable" },
            spec.aliases.join(", ")
        );
    }

    println!("\n✅ Total: {} language(s)", registry.specs().len());
    Ok(())
}

/// Decode a test-case file; returns how many cases it holds
pub fn validate_tests(file: &Path) -> Result<usize> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("Failed to read test file {}", file.display()))?;

    let test_cases = codec::decode(&raw)?;
    if test_cases.is_empty() {
        bail!("No test cases provided in {}", file.display());
    }

    println!("✅ {} contains {} test case(s)", file.display(), test_cases.len());
    Ok(test_cases.len())
}

/// Arguments of `add-lang`
#[derive(Debug, Default)]
pub struct NewLanguage {
    pub name: String,
    pub ext: String,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub compile_command: Option<String>,
    pub compile_args: Vec<String>,
    pub aliases: Vec<String>,
    pub version: Option<String>,
}

impl NewLanguage {
    fn into_spec(self) -> Result<LanguageSpec> {
        let name = self.name.trim().to_lowercase();
        let ext = self.ext.trim().trim_start_matches('.').to_string();
        if name.is_empty() || ext.is_empty() {
            bail!("Language name and extension cannot be empty");
        }

        let compile = self.compile_command.map(|command| CompileStep {
            command,
            args: if self.compile_args.is_empty() {
                vec!["-o".to_string(), BINARY_PLACEHOLDER.to_string(), SOURCE_PLACEHOLDER.to_string()]
            } else {
                self.compile_args
            },
        });

        // Compiled languages run their build output unless told otherwise
        let (command, args) = match (self.command, compile.is_some()) {
            (Some(command), _) => (command, self.args),
            (None, true) => (BINARY_PLACEHOLDER.to_string(), self.args),
            (None, false) => (name.clone(), self.args),
        };
        let args = if args.is_empty() && command != BINARY_PLACEHOLDER {
            vec![SOURCE_PLACEHOLDER.to_string()]
        } else {
            args
        };

        Ok(LanguageSpec {
            name,
            aliases: self.aliases,
            version: self.version,
            execution: LanguageExecution {
                command,
                args,
                file_extension: ext,
            },
            compile,
            implemented: true,
        })
    }
}

/// Append a language to the config file, rejecting name clashes
pub fn add_language(config: &Path, new_language: NewLanguage) -> Result<LanguageSpec> {
    let spec = new_language.into_spec()?;
    println!("🚀 Adding language: {}", spec.name);

    let mut languages = if config.exists() {
        LanguagesFile::load(config)?
    } else {
        LanguagesFile::default()
    };

    languages.languages.push(spec.clone());
    LanguageRegistry::from_specs(languages.languages.clone())
        .with_context(|| format!("Cannot add '{}'", spec.name))?;

    println!("📝 Updating {}...", config.display());
    languages.save(config)?;

    println!("✅ Language '{}' added successfully!", spec.name);
    println!("\n📋 Next steps:");
    println!(
        "  1. Make sure '{}' is installed on every API host",
        spec.compile.as_ref().map_or(&spec.execution.command, |c| &c.command)
    );
    println!("  2. Try it: crucible-cli run --lang {} --source main.{} --tests tests.json", spec.name, spec.execution.file_extension);

    Ok(spec)
}

/// Load challenges from a JSON file into Redis
pub async fn seed_challenges(file: &Path, redis_url: &str) -> Result<usize> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let challenges: Vec<Challenge> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    for challenge in &challenges {
        let test_cases = codec::decode(&challenge.test_cases)
            .with_context(|| format!("Challenge {} has invalid test cases", challenge.id))?;
        if test_cases.is_empty() {
            bail!("Challenge {} has no test cases", challenge.id);
        }
    }

    let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
    let mut conn = redis::aio::ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;

    println!("🌱 Seeding {} challenge(s) into {}", challenges.len(), redis_url);
    for challenge in &challenges {
        crucible_common::redis::put_challenge(&mut conn, challenge)
            .await
            .with_context(|| format!("Failed to store challenge {}", challenge.id))?;
        println!("  ✓ {} ({} points)", challenge.title, challenge.points);
    }

    println!("\n✅ Seed complete");
    Ok(challenges.len())
}
