mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crucible-cli")]
#[command(about = "Crucible CLI - Run submissions locally and manage language backends", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file against a test-case file
    Run {
        /// Language name or alias (e.g., python, js, c)
        #[arg(short, long)]
        lang: String,

        /// Path to the source file
        #[arg(short, long)]
        source: PathBuf,

        /// Path to the JSON test-case file
        #[arg(short, long)]
        tests: PathBuf,

        /// Per-test timeout in milliseconds (defaults to CRUCIBLE_TIMEOUT_MS or 5000)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// List configured languages
    Languages {
        #[arg(short, long, default_value = "config/languages.json")]
        config: PathBuf,
    },

    /// Check that a test-case file decodes and is non-empty
    ValidateTests {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Add a new language backend to languages.json
    AddLang {
        /// Language name (e.g., ruby, go)
        #[arg(short, long)]
        name: String,

        /// Source file extension (e.g., rb, go)
        #[arg(short, long)]
        ext: String,

        /// Interpreter or run command (defaults to the language name)
        #[arg(short, long)]
        command: Option<String>,

        /// Run arguments; use {source}, {binary} and {dir} placeholders
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        args: Vec<String>,

        /// Compiler command, for compiled languages
        #[arg(long)]
        compile_command: Option<String>,

        /// Compiler arguments
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        compile_args: Vec<String>,

        /// Alternative names accepted for this language
        #[arg(short, long)]
        alias: Vec<String>,

        /// Language version (e.g., 3.12)
        #[arg(short, long)]
        version: Option<String>,

        #[arg(long, default_value = "config/languages.json")]
        config: PathBuf,
    },

    /// Load challenges from a JSON file into Redis
    Seed {
        #[arg(short, long, default_value = "config/challenges.json")]
        file: PathBuf,

        #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
        redis_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            lang,
            source,
            tests,
            timeout_ms,
        } => {
            commands::run_submission(&lang, &source, &tests, timeout_ms).await?;
        }
        Commands::Languages { config } => {
            commands::list_languages(&config)?;
        }
        Commands::ValidateTests { file } => {
            commands::validate_tests(&file)?;
        }
        Commands::AddLang {
            name,
            ext,
            command,
            args,
            compile_command,
            compile_args,
            alias,
            version,
            config,
        } => {
            let new_language = commands::NewLanguage {
                name,
                ext,
                command,
                args,
                compile_command,
                compile_args,
                aliases: alias,
                version,
            };
            commands::add_language(&config, new_language)?;
        }
        Commands::Seed { file, redis_url } => {
            commands::seed_challenges(&file, &redis_url).await?;
        }
    }

    Ok(())
}
