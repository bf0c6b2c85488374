mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coderun-cli")]
#[command(about = "Run code locally through the coderun execution pipeline", long_about = None)]
struct Cli {
    /// Override the built-in language table
    #[arg(long, global = true, env = "CODERUN_LANGUAGES_FILE")]
    languages_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile (if needed) and run a program
    Run {
        /// Language name (e.g., python, c, rust)
        #[arg(short, long)]
        language: String,

        /// Source file to run
        #[arg(short, long, conflicts_with = "code", required_unless_present = "code")]
        file: Option<PathBuf>,

        /// Inline source code
        #[arg(short, long)]
        code: Option<String>,

        /// Text piped to the program's stdin
        #[arg(short, long, conflicts_with = "input_file")]
        input: Option<String>,

        /// File piped to the program's stdin
        #[arg(long)]
        input_file: Option<PathBuf>,

        /// Compile phase deadline in seconds
        #[arg(long)]
        compile_timeout: Option<u64>,

        /// Execute phase deadline in seconds
        #[arg(long)]
        execute_timeout: Option<u64>,

        /// Directory for job artifacts
        #[arg(long, env = "CODERUN_WORK_DIR")]
        work_dir: Option<PathBuf>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// List supported languages
    Languages,

    /// Show metadata for a language
    Info {
        /// Language name
        #[arg(short, long)]
        language: String,
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
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            language,
            file,
            code,
            input,
            input_file,
            compile_timeout,
            execute_timeout,
            work_dir,
            json,
        } => {
            let options = commands::RunOptions {
                language,
                file,
                code,
                input,
                input_file,
                compile_timeout,
                execute_timeout,
                work_dir,
                languages_file: cli.languages_file,
                json,
            };
            let exit_code = commands::run(options).await?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        Commands::Languages => {
            commands::list_languages(cli.languages_file.as_deref())?;
        }
        Commands::Info { language } => {
            commands::show_info(cli.languages_file.as_deref(), &language)?;
        }
    }

    Ok(())
}
