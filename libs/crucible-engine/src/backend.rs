/// Language Backend Dispatcher
///
/// **Responsibility:**
/// Map a language name to a concrete program invocation.
///
/// - Interpreted backends: write the source into a scratch directory and
///   hand it to the interpreter.
/// - Compiled backends: same, plus a compile step whose failure is reported
///   as `CompilationError` rather than a runtime failure.
/// - Backends without a real implementation fail closed with
///   `NotImplemented`; they never produce output.

use crate::error::ExecutionError;
use crate::runner::{Invocation, ProcessRunner, ScratchSpace};
use anyhow::{bail, Context, Result};
use crucible_common::config::ExecutionConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Argument template placeholders, substituted per invocation
pub const SOURCE_PLACEHOLDER: &str = "{source}";
pub const BINARY_PLACEHOLDER: &str = "{binary}";
pub const DIR_PLACEHOLDER: &str = "{dir}";

pub const DEFAULT_LANGUAGES_PATH: &str = "config/languages.json";
const BINARY_NAME: &str = "main.out";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageExecution {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub file_extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileStep {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub execution: LanguageExecution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile: Option<CompileStep>,
    #[serde(default = "default_implemented")]
    pub implemented: bool,
}

fn default_implemented() -> bool {
    true
}

fn to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

impl LanguageSpec {
    pub fn interpreted(name: &str, command: &str, args: &[&str], file_extension: &str) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            version: None,
            execution: LanguageExecution {
                command: command.to_string(),
                args: to_strings(args),
                file_extension: file_extension.to_string(),
            },
            compile: None,
            implemented: true,
        }
    }

    pub fn compiled(
        name: &str,
        compile: (&str, &[&str]),
        run: (&str, &[&str]),
        file_extension: &str,
    ) -> Self {
        let mut spec = Self::interpreted(name, run.0, run.1, file_extension);
        spec.compile = Some(CompileStep {
            command: compile.0.to_string(),
            args: to_strings(compile.1),
        });
        spec
    }

    /// Registered so the name is recognised, but refuses to run anything
    pub fn unimplemented(name: &str, file_extension: &str) -> Self {
        let mut spec = Self::interpreted(name, "", &[], file_extension);
        spec.implemented = false;
        spec
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = to_strings(aliases);
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    pub fn source_file_name(&self) -> String {
        format!("main.{}", self.execution.file_extension)
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// On-disk form of `config/languages.json`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LanguagesFile {
    pub languages: Vec<LanguageSpec>,
}

impl LanguagesFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Language config file not found: {}", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize languages")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Language name '{0}' is registered more than once")]
    Duplicate(String),
    #[error("Language entry has an empty name")]
    EmptyName,
    #[error("No languages configured")]
    Empty,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Read-only lookup table shared by every execution
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    specs: Vec<LanguageSpec>,
    index: HashMap<String, usize>,
}

impl LanguageRegistry {
    /// Build a registry, rejecting any name or alias claimed twice
    pub fn from_specs(specs: Vec<LanguageSpec>) -> Result<Self, RegistryError> {
        if specs.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut index = HashMap::new();
        for (position, spec) in specs.iter().enumerate() {
            for name in spec.names() {
                let key = normalize(name);
                if key.is_empty() {
                    return Err(RegistryError::EmptyName);
                }
                if index.insert(key.clone(), position).is_some() {
                    return Err(RegistryError::Duplicate(key));
                }
            }
        }

        Ok(Self { specs, index })
    }

    /// Languages available without any configuration file
    pub fn builtin() -> Self {
        let specs = builtin_specs();
        let index = specs
            .iter()
            .enumerate()
            .flat_map(|(position, spec)| spec.names().map(move |name| (normalize(name), position)))
            .collect();
        Self { specs, index }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = LanguagesFile::load(path)?;
        let registry = Self::from_specs(file.languages)
            .with_context(|| format!("Invalid language configuration in {}", path.display()))?;
        Ok(registry)
    }

    /// Load from CRUCIBLE_LANGUAGES or config/languages.json, else builtin
    pub fn load_default() -> Self {
        let path = std::env::var("CRUCIBLE_LANGUAGES")
            .unwrap_or_else(|_| DEFAULT_LANGUAGES_PATH.to_string());

        match Self::load(Path::new(&path)) {
            Ok(registry) => {
                info!(path = %path, languages = ?registry.list_languages(), "Loaded language configuration");
                registry
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Falling back to builtin languages");
                Self::builtin()
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&LanguageSpec> {
        self.index.get(&normalize(name)).map(|&position| &self.specs[position])
    }

    /// Case-insensitive lookup that fails closed for unimplemented backends
    pub fn resolve(&self, name: &str) -> Result<&LanguageSpec, ExecutionError> {
        let spec = self
            .get(name)
            .ok_or_else(|| ExecutionError::UnsupportedLanguage(name.trim().to_string()))?;

        if !spec.implemented {
            return Err(ExecutionError::NotImplemented(spec.name.clone()));
        }

        Ok(spec)
    }

    pub fn list_languages(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn specs(&self) -> &[LanguageSpec] {
        &self.specs
    }
}

fn builtin_specs() -> Vec<LanguageSpec> {
    vec![
        LanguageSpec::interpreted("python", "python3", &[SOURCE_PLACEHOLDER], "py")
            .with_aliases(&["py", "python3"])
            .with_version("3"),
        LanguageSpec::interpreted("javascript", "node", &[SOURCE_PLACEHOLDER], "js")
            .with_aliases(&["js", "node"]),
        LanguageSpec::compiled(
            "c",
            ("gcc", &["-O2", "-std=c11", "-o", BINARY_PLACEHOLDER, SOURCE_PLACEHOLDER, "-lm"]),
            (BINARY_PLACEHOLDER, &[]),
            "c",
        )
        .with_aliases(&["gcc"]),
        LanguageSpec::unimplemented("csharp", "cs").with_aliases(&["c#", "cs"]),
    ]
}

/// Source materialized on disk and ready to run
///
/// Owns its scratch directory: dropping the program removes every file
/// created for it, including compiler output.
#[derive(Debug)]
pub struct PreparedProgram {
    invocation: Invocation,
    scratch: ScratchSpace,
}

impl PreparedProgram {
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }
}

struct Placeholders {
    source: String,
    binary: String,
    dir: String,
}

impl Placeholders {
    fn substitute(&self, template: &str) -> String {
        template
            .replace(SOURCE_PLACEHOLDER, &self.source)
            .replace(BINARY_PLACEHOLDER, &self.binary)
            .replace(DIR_PLACEHOLDER, &self.dir)
    }

    fn invocation(&self, command: &str, args: &[String], working_dir: &Path) -> Invocation {
        Invocation {
            program: self.substitute(command),
            args: args.iter().map(|arg| self.substitute(arg)).collect(),
            working_dir: working_dir.to_path_buf(),
        }
    }
}

/// Write `code` into a fresh scratch directory and, for compiled languages,
/// build it
pub async fn prepare(
    spec: &LanguageSpec,
    code: &str,
    config: &ExecutionConfig,
) -> Result<PreparedProgram, ExecutionError> {
    if !spec.implemented {
        return Err(ExecutionError::NotImplemented(spec.name.clone()));
    }

    let scratch = ScratchSpace::create(&config.scratch_root).await?;
    let source = scratch.write_file(&spec.source_file_name(), code).await?;
    let placeholders = Placeholders {
        source: source.to_string_lossy().into_owned(),
        binary: scratch.path().join(BINARY_NAME).to_string_lossy().into_owned(),
        dir: scratch.path().to_string_lossy().into_owned(),
    };

    if let Some(step) = &spec.compile {
        let invocation = placeholders.invocation(&step.command, &step.args, scratch.path());
        let compiler = ProcessRunner::new(config.compile_timeout(), config.max_output_bytes);

        match compiler.run(&invocation, "").await {
            Ok(_) => debug!(language = %spec.name, "Compilation succeeded"),
            Err(ExecutionError::NonZeroExit { stdout, stderr, code }) => {
                let diagnostics = if stderr.trim().is_empty() { stdout } else { stderr };
                warn!(
                    language = %spec.name,
                    exit_code = ?code,
                    error_preview = diagnostics.lines().next().unwrap_or(""),
                    "Compilation failed"
                );
                return Err(ExecutionError::CompilationError(diagnostics.trim().to_string()));
            }
            Err(ExecutionError::TimedOut) => {
                warn!(language = %spec.name, "Compilation timed out");
                return Err(ExecutionError::CompilationError("Compilation timed out".to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    let invocation = placeholders.invocation(
        &spec.execution.command,
        &spec.execution.args,
        scratch.path(),
    );

    Ok(PreparedProgram { invocation, scratch })
}
