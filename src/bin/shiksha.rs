//! Shiksha CLI — 列出、描述并运行教育流程
//!
//! Usage:
//!   shiksha list                                   List registered flows
//!   shiksha describe <flow>                        Print a flow's schemas, prompt and model
//!   shiksha run <flow> --input <json|@file> [--media <field>=<path>]...
//!
//! Settings come from `--config` or `SHIKSHA_CONFIG`, then the environment
//! (a `.env` file in the working directory is loaded first).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use shiksha_flows::education::{self, quiz};
use shiksha_flows::game::{self, GameDocument};
use shiksha_flows::{DataUri, GeminiClient, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run the Shiksha AI teaching-assistant flows from the command line
#[derive(Parser)]
#[command(name = "shiksha", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (YAML); overrides SHIKSHA_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// List registered flows
    List,
    /// Print a flow's descriptor as JSON
    Describe {
        /// Flow name, e.g. answerStudentQuestionFlow
        flow: String,
    },
    /// Invoke a flow and print its output as JSON
    Run {
        flow: String,
        /// Input object as JSON, or @path to read it from a file
        #[arg(long, default_value = "{}")]
        input: String,
        /// Attach a file as a media field: <field>=<path>
        #[arg(long = "media", value_name = "FIELD=PATH")]
        media: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    info!(model = %settings.default_model, "settings loaded");

    let client = Arc::new(GeminiClient::from_settings(&settings)?);
    let registry = education::registry(client, &settings.model_defaults())?;

    match cli.command {
        Command::List => {
            for name in registry.names() {
                println!("{}", name);
            }
        }
        Command::Describe { flow } => {
            let desc = registry.get(&flow)?.describe();
            println!("{}", serde_json::to_string_pretty(&desc)?);
        }
        Command::Run { flow, input, media } => {
            let input = build_input(&input, &media)?;
            let output = registry.invoke(&flow, input).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            if flow == quiz::NAME {
                report_quiz(&output);
            }
        }
    }
    Ok(())
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::from_env()?);
    };
    let settings = Settings::from_yaml_file(path)?.apply_env_with(|name| std::env::var(name).ok())?;
    settings.validate()?;
    Ok(settings)
}

fn build_input(raw: &str, media: &[String]) -> anyhow::Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input file '{}'", path))?,
        None => raw.to_string(),
    };
    let mut value: Value = serde_json::from_str(&text).context("input is not valid JSON")?;
    let Some(obj) = value.as_object_mut() else {
        bail!("input must be a JSON object");
    };

    for spec in media {
        let Some((field, path)) = spec.split_once('=') else {
            bail!("--media expects <field>=<path>, got '{}'", spec);
        };
        let uri = DataUri::from_file(path)
            .with_context(|| format!("failed to load media for '{}'", field))?;
        obj.insert(field.to_string(), Value::String(uri.to_string()));
    }
    Ok(value)
}

fn report_quiz(output: &Value) {
    let Some(raw) = output.get("quiz").and_then(Value::as_str) else {
        return;
    };
    match game::classify(raw) {
        Ok(GameDocument::Mcq(quiz)) => eprintln!(
            "multiple-choice quiz '{}' with {} questions",
            quiz.title,
            quiz.questions.len()
        ),
        Ok(GameDocument::Unknown(_)) => {
            eprintln!("quiz is not a multiple-choice document; showing raw JSON")
        }
        Err(e) => eprintln!("warning: {}", e),
    }
}
