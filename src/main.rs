//! nlq - ask a MySQL or MongoDB database questions in plain English.

mod cli;

use cli::Cli;
use nlq_bridge::config::Config;
use nlq_bridge::llm::create_generator;
use nlq_bridge::safety::{StageAllowList, Validator};
use nlq_bridge::{
    BackendTarget, BridgeError, DocumentHandler, OrchestrationOutcome, Orchestrator,
    RelationalHandler, Result,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// How long to wait for backends to close before exiting anyway.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    if cli.log_file {
        nlq_bridge::logging::init_file_logging();
    } else {
        nlq_bridge::logging::init_stderr_logging();
    }

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    }
}

/// Runs the CLI. Returns `Ok(false)` when a one-shot request did not complete.
async fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply_overrides(&mut config)?;

    let orchestrator = build_orchestrator(&cli, &config).await?;
    if !orchestrator.has_backend(cli.backend) {
        warn!(backend = %cli.backend, "Selected backend is not configured");
    }

    let success = match &cli.instruction {
        Some(instruction) => {
            let outcome = orchestrator.run_query(instruction, cli.backend).await;
            print_outcome(&outcome, cli.json);
            outcome.is_success()
        }
        None => {
            run_stdin(&orchestrator, cli.backend, cli.json).await?;
            true
        }
    };

    orchestrator.shutdown(CLOSE_GRACE).await?;
    Ok(success)
}

async fn build_orchestrator(cli: &Cli, config: &Config) -> Result<Orchestrator> {
    let generator = create_generator(&config.llm, cli.api_key.clone())?;

    let mut validator = Validator::new();
    if let Some(stages) = &config.orchestrator.allowed_stages {
        validator = validator.with_allowed_stages(StageAllowList::new(stages));
    }

    let mut orchestrator = Orchestrator::new(generator)
        .with_timeout(config.orchestrator.timeout())
        .with_validator(validator);

    // Only the selected backend is connected; the other stays unconfigured.
    match cli.backend {
        BackendTarget::Relational => {
            if let Some(relational) = config.resolve_relational() {
                info!("Connecting to {}", relational.display_string());
                orchestrator = orchestrator.with_relational(RelationalHandler::connect(&relational).await?);
            }
        }
        BackendTarget::Document => {
            if let Some(document) = config.resolve_document() {
                info!("Connecting to {}", document.display_string());
                orchestrator = orchestrator.with_document(DocumentHandler::connect(&document).await?);
            }
        }
    }

    Ok(orchestrator)
}

/// Reads instructions from stdin, one per line, until EOF.
async fn run_stdin(orchestrator: &Orchestrator, target: BackendTarget, json: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| BridgeError::internal(format!("Failed to read stdin: {e}")))?
    {
        let instruction = line.trim();
        if instruction.is_empty() {
            continue;
        }
        let outcome = orchestrator.run_query(instruction, target).await;
        print_outcome(&outcome, json);
    }

    Ok(())
}

fn print_outcome(outcome: &OrchestrationOutcome, json: bool) {
    if json {
        match serde_json::to_string(outcome) {
            Ok(line) => println!("{line}"),
            Err(e) => error!(error = %e, "Failed to serialize outcome"),
        }
        return;
    }

    println!("{}", outcome.query_representation);
    println!();
    println!("{}", outcome.display_result);
    println!();
}
