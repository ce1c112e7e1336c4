//! Tea Stall Bench CLI entry point.
//!
//! This binary is the composition root for the whole system:
//!
//! 1. **Load configuration** from defaults, `teastall.toml`, `TEASTALL_*`
//!    environment variables and command-line overrides (see [`config`]).
//! 2. **Wire observability** with `tracing-subscriber` and, when configured,
//!    an OpenTelemetry OTLP exporter (see [`telemetry`]).
//! 3. **Construct infrastructure**: the text generator from the `llm` crate
//!    and the search providers from the `search` crate, injected into a
//!    [`nodes::PipelineExecutor`].
//! 4. **Run** one pipeline per invocation; Ctrl-C cancels at the next stage
//!    boundary.

mod config;
mod output;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use nodes::PipelineExecutor;
use pipeline::{ContentOptions, RunRequest};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "teastall", version, about = "Research, outline and write an article about a topic", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./teastall.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the pipeline for one topic
    Generate(GenerateArgs),
    /// Print the effective configuration with secrets redacted
    Config,
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// What the article is about
    topic: String,

    /// Writing style (e.g. professional, friendly, technical)
    #[arg(long)]
    style: Option<String>,

    /// Target length: short, medium or long
    #[arg(long)]
    length: Option<String>,

    /// Publishing channel (blog, linkedin, instagram, whatsapp, email)
    #[arg(long)]
    channel: Option<String>,

    /// Kind of content (e.g. blog, newsletter)
    #[arg(long)]
    content_type: Option<String>,

    /// Override the configured model
    #[arg(long)]
    model: Option<String>,

    /// Condense search results into a research report before outlining
    #[arg(long)]
    summarize_research: bool,

    /// Print the full run record as JSON
    #[arg(long)]
    json: bool,
}

impl GenerateArgs {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(model) = &self.model {
            config.llm.model = Some(model.clone());
        }
        if self.summarize_research {
            config.pipeline.summarize_research = true;
        }
    }

    fn request(&self) -> RunRequest {
        let defaults = ContentOptions::default();
        RunRequest {
            topic: self.topic.clone(),
            options: ContentOptions {
                content_type: self.content_type.clone().unwrap_or(defaults.content_type),
                style: self.style.clone().unwrap_or(defaults.style),
                length: self.length.clone().unwrap_or(defaults.length),
                channel: self.channel.clone().unwrap_or(defaults.channel),
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let guard = match telemetry::init(cli.verbose, cli.quiet, cli.log_format) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(cli).await;
    if let Err(err) = &result {
        error!(error = %format!("{err:#}"), "Run aborted");
        eprintln!("error: {err:#}");
    }
    guard.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Config => {
            let printed = serde_json::to_string_pretty(&config.redacted())?;
            println!("{printed}");
            Ok(())
        }
        Command::Generate(args) => {
            args.apply_overrides(&mut config);
            generate(&config, &args).await
        }
    }
}

async fn generate(config: &AppConfig, args: &GenerateArgs) -> anyhow::Result<()> {
    let generator = llm::build_generator(&config.llm).context("failed to set up text generation")?;
    let providers =
        search::build_providers(&config.search).context("failed to set up web search")?;
    let executor = PipelineExecutor::from_settings(
        &config.pipeline,
        generator,
        providers.primary,
        providers.secondary,
    )?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current stage");
            on_interrupt.cancel();
        }
    });

    let response = executor.run_with_cancel(args.request(), &cancel).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", output::render(&response));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_args_fill_unset_options_with_defaults() {
        let cli = Cli::parse_from([
            "teastall",
            "generate",
            "Rust async",
            "--channel",
            "linkedin",
            "--json",
        ]);
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let request = args.request();
        assert_eq!(request.topic, "Rust async");
        assert_eq!(request.options.channel, "linkedin");
        assert_eq!(request.options.style, "professional");
        assert!(args.json);
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = Cli::parse_from([
            "teastall",
            "-v",
            "generate",
            "Tea",
            "--model",
            "mistral",
            "--summarize-research",
        ]);
        assert_eq!(cli.verbose, 1);
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.llm.model.as_deref(), Some("mistral"));
        assert!(config.pipeline.summarize_research);
    }
}
