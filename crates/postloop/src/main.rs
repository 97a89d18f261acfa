mod config;
mod workflow;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use postloop_core::DEFAULT_MAX_ITERATIONS;
use postloop_logging::{init_tracing, LogFormat};
use postloop_provider::ModelClient;

use crate::config::ProjectConfig;
use crate::workflow::{Workflow, WorkflowOptions, WorkflowReport};

#[derive(Parser, Debug)]
#[command(
    name = "postloop",
    about = "Quality-gated social post generation",
    version,
    author
)]
struct Cli {
    /// Topic to research and write about
    #[arg(short, long)]
    topic: String,

    /// Target audience
    #[arg(short, long, default_value = "general readers")]
    audience: String,

    /// Directory post projects are created under
    #[arg(short = 'o', long, default_value = "posts")]
    output_dir: PathBuf,

    /// Number of images to generate (1-3)
    #[arg(long)]
    images: Option<usize>,

    /// Iteration budget for every stage (overrides config)
    #[arg(short = 'n', long)]
    max_iterations: Option<usize>,

    /// Model to use (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Skip the image stage even when a tool is configured
    #[arg(long)]
    skip_images: bool,

    /// Output the final report as JSON
    #[arg(long)]
    json_output: bool,

    /// Dry run: show what would happen without executing
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_format: LogFormat = cli.log_format.into();
    init_tracing("info", log_format);

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = ProjectConfig::load(&working_dir)?.unwrap_or_default();

    let image_tool = if cli.skip_images {
        None
    } else {
        config
            .images
            .tool
            .clone()
            .map(|tool| (tool, config.images.tool_args.clone()))
    };

    let options = WorkflowOptions {
        topic: cli.topic.clone(),
        audience: cli.audience.clone(),
        output_dir: cli.output_dir.clone(),
        log_format,
        image_count: cli.images.or(config.images.count).unwrap_or(3),
        research_iterations: cli
            .max_iterations
            .or(config.research.max_iterations)
            .unwrap_or(DEFAULT_MAX_ITERATIONS),
        content_iterations: cli
            .max_iterations
            .or(config.content.max_iterations)
            .unwrap_or(DEFAULT_MAX_ITERATIONS),
        image_iterations: cli
            .max_iterations
            .or(config.images.max_iterations)
            .unwrap_or(DEFAULT_MAX_ITERATIONS),
        image_tool,
    };

    if cli.dry_run {
        println!("=== Dry Run ===");
        println!("Topic: {}", options.topic);
        println!("Audience: {}", options.audience);
        println!("Output dir: {}", options.output_dir.display());
        println!(
            "Iterations: research={} content={} images={}",
            options.research_iterations, options.content_iterations, options.image_iterations
        );
        match &options.image_tool {
            Some((tool, _)) => println!("Images: {} via {}", options.image_count, tool),
            None => println!("Images: skipped (no tool configured)"),
        }
        return Ok(());
    }

    // One shared client for every model-backed capability in the run.
    let mut client = ModelClient::from_env()?;
    if let Some(model) = cli.model.or(config.model) {
        client = client.with_model(model);
    }
    if let Some(base_url) = config.base_url {
        client = client.with_base_url(base_url);
    }
    if let Some(max_tokens) = config.max_tokens {
        client = client.with_max_tokens(max_tokens);
    }

    // Handle Ctrl+C gracefully: finish the current iteration, keep the
    // best artifact produced so far.
    let interrupt = Arc::new(AtomicBool::new(false));
    let handler_flag = interrupt.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing current iteration...");
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let workflow = Workflow::new(Arc::new(client), options);
    let report = workflow.run(interrupt).await?;

    if cli.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    std::process::exit(if report.all_converged() { 0 } else { 1 });
}

fn print_report(report: &WorkflowReport) {
    eprintln!();
    if report.all_converged() {
        eprintln!("=== DONE ===");
    } else {
        eprintln!("=== DONE (with degraded stages) ===");
    }
    if let Some(title) = &report.title {
        eprintln!("Title: {}", title);
    }
    for stage in &report.stages {
        let mark = if stage.converged { "ok" } else { "best-effort" };
        eprintln!(
            "  {}: {} after {} iteration(s), score {:.1}",
            stage.stage, mark, stage.iterations, stage.score
        );
    }
    eprintln!("Output: {}", report.project_dir.display());
}
