//! ragtrace - CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use ragtrace::cli::{Args, Commands, Verbosity};
use ragtrace::config::{RagConfig, ENV_API_KEY, ENV_CONNECTION_STRING};
use ragtrace::rag::{build_context, retrieve_with_deadline, RetrievedChunk, Retriever};
use ragtrace::render::print_trace;

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.verbosity().log_filter()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &Args) -> Result<RagConfig> {
    let config = match &args.config {
        Some(path) => RagConfig::load_from(path),
        None => RagConfig::load(),
    };
    config.context("Failed to load configuration")
}

fn spinner(verbosity: Verbosity, message: &str) -> Option<ProgressBar> {
    if !verbosity.show_progress() {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn print_chunks(chunks: &[RetrievedChunk]) {
    if chunks.is_empty() {
        println!("{}", "No context retrieved.".yellow());
        return;
    }
    for (idx, chunk) in chunks.iter().enumerate() {
        let score = chunk
            .score
            .map(|s| format!("(score {:.4})", s))
            .unwrap_or_default();
        println!("{} {}", format!("[{}]", idx + 1).bold(), score.dimmed());
        println!("{}\n", chunk.text.trim());
    }
}

async fn run_query(
    args: &Args,
    mut config: RagConfig,
    text: &str,
    trace: bool,
    json: bool,
    top_k: Option<usize>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    if let Some(k) = top_k {
        config.store.top_k = k;
    }
    if let Some(secs) = timeout_secs {
        config.trace.overall_timeout_secs = secs;
    }
    config.validate()?;

    let retriever = Retriever::from_config(&config)?;
    let show_trace = trace || config.trace.enabled;
    let pb = if json { None } else { spinner(args.verbosity(), "Retrieving context...") };

    let result = retrieve_with_deadline(&retriever, text, config.trace.overall_timeout()).await;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if json {
        let output = if show_trace {
            serde_json::to_string_pretty(&result)?
        } else {
            serde_json::to_string_pretty(&result.chunks)?
        };
        println!("{}", output);
        return Ok(());
    }

    print_chunks(&result.chunks);
    if show_trace {
        print_trace(&result.trace);
    }
    Ok(())
}

async fn run_context(args: &Args, mut config: RagConfig, text: &str, top_k: Option<usize>) -> Result<()> {
    if let Some(k) = top_k {
        config.store.top_k = k;
    }
    config.validate()?;

    let retriever = Retriever::from_config(&config)?;
    let pb = spinner(args.verbosity(), "Building context...");

    let traced = build_context(
        &retriever,
        text,
        config.trace.overall_timeout(),
        config.trace.snippet_chars,
    )
    .await;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    println!("{}", traced.context);
    if config.trace.enabled {
        print_trace(&traced.trace);
    }
    Ok(())
}

fn show_config(config: &RagConfig) -> Result<()> {
    let status = |set: bool| if set { "set".green() } else { "not set".red() };

    println!("{}", "Effective configuration".bold());
    println!("─────────────────────────────────────");
    println!("{}", toml::to_string_pretty(config).context("Failed to serialize config")?);
    println!("{:<16} {}", ENV_CONNECTION_STRING, status(config.store.connection_string().is_some()));
    println!("{:<16} {}", ENV_API_KEY, status(config.embedding.api_key().is_some()));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = load_config(&args)?;

    match &args.command {
        Commands::Query {
            text,
            trace,
            json,
            top_k,
            timeout_secs,
        } => run_query(&args, config, text, *trace, *json, *top_k, *timeout_secs).await,
        Commands::Context { text, top_k } => run_context(&args, config, text, *top_k).await,
        Commands::Config => show_config(&config),
    }
}
