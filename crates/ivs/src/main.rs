use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ivs_agents::Dispatcher;
use ivs_models::{IdeaPayload, IvsConfig, SubmissionStatus};
use ivs_store::SubmissionStore;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "ivs", about = "Idea Validation System")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/ivs.toml")]
    config: String,

    /// Pretty-print the output JSON
    #[arg(long, global = true)]
    pretty: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit an idea (JSON payload) and analyze it
    Submit {
        /// Read the IdeaPayload JSON from a file instead of stdin
        #[arg(short, long)]
        input: Option<String>,

        #[arg(long, default_value = "local")]
        owner: String,

        /// Print the settled submission instead of just its id
        #[arg(long)]
        wait: bool,
    },
    /// Run the analysis for a submission already in `analyzing`
    Run { id: Uuid },
    /// Rerun a completed, failed or pending submission
    Resubmit { id: Uuid },
    /// Show a submission and its status
    Status { id: Uuid },
    /// Show the report of a completed submission
    Report { id: Uuid },
    /// List an owner's submissions, newest first
    List {
        #[arg(long, default_value = "local")]
        owner: String,
    },
    /// Delete a submission and its report
    Delete { id: Uuid },
    /// Ask the advisor a question about a submission
    Ask {
        id: Uuid,
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Fail submissions stuck in `analyzing`
    Sweep {
        /// Keep sweeping on the configured interval until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respects RUST_LOG
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let config = ivs::load_config(&cli.config)?;
    let pretty = cli.pretty;

    match cli.command {
        Command::Submit { input, owner, wait } => submit(&config, input, &owner, wait, pretty).await,
        Command::Run { id } => run(&config, id, pretty).await,
        Command::Resubmit { id } => resubmit(&config, id, pretty).await,
        Command::Status { id } => {
            let reader = ivs::build_reader(&config, ivs::build_store(&config)?);
            let submission = reader
                .submission(id)
                .await?
                .with_context(|| format!("No submission {id}"))?;
            print_json(&submission, pretty)
        }
        Command::Report { id } => {
            let reader = ivs::build_reader(&config, ivs::build_store(&config)?);
            match reader.report_for(id).await? {
                Some(report) => print_json(report.as_ref(), pretty),
                None => match reader.status(id).await? {
                    Some(status) => bail!("No report for {id} (status: {status})"),
                    None => bail!("No submission {id}"),
                },
            }
        }
        Command::List { owner } => {
            let store = ivs::build_store(&config)?;
            print_json(&store.list_submissions(&owner).await?, pretty)
        }
        Command::Delete { id } => {
            let store = ivs::build_store(&config)?;
            if !store.delete_submission(id).await? {
                bail!("No submission {id}");
            }
            print_json(&serde_json::json!({ "deleted": id }), pretty)
        }
        Command::Ask { id, message } => {
            let advisor = ivs::build_advisor(&config, ivs::build_store(&config)?)?;
            let reply = advisor.ask(id, &message.join(" ")).await?;
            print_json(&serde_json::json!({ "reply": reply }), pretty)
        }
        Command::Sweep { watch } => sweep(&config, watch, pretty).await,
    }
}

async fn submit(
    config: &IvsConfig,
    input: Option<String>,
    owner: &str,
    wait: bool,
    pretty: bool,
) -> Result<()> {
    let payload_json = if let Some(input_path) = &input {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input: {input_path}"))?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    };
    let payload: IdeaPayload =
        serde_json::from_str(&payload_json).context("Failed to parse IdeaPayload JSON")?;

    let store = ivs::build_store(config)?;
    let orchestrator = ivs::build_orchestrator(config, store.clone())
        .context("Failed to build orchestrator")?;
    let dispatcher = Dispatcher::new(Arc::new(orchestrator));

    let id = dispatcher.submit(owner, payload).await?;
    if !wait {
        print_json(
            &serde_json::json!({ "id": id, "status": SubmissionStatus::Analyzing }),
            pretty,
        )?;
    }

    // The process owns the background run, so it must drain before exiting.
    dispatcher.shutdown().await;

    if wait {
        let submission = store
            .get_submission(id)
            .await?
            .with_context(|| format!("Submission {id} disappeared"))?;
        print_json(&submission, pretty)?;
    }
    Ok(())
}

async fn run(config: &IvsConfig, id: Uuid, pretty: bool) -> Result<()> {
    let store = ivs::build_store(config)?;
    let submission = store
        .get_submission(id)
        .await?
        .with_context(|| format!("No submission {id}"))?;
    let orchestrator = ivs::build_orchestrator(config, store)
        .context("Failed to build orchestrator")?;

    let report = orchestrator
        .run(id, &submission.payload)
        .await
        .map_err(|e| anyhow::anyhow!("Analysis failed: {e}"))?;
    print_json(&report, pretty)
}

async fn resubmit(config: &IvsConfig, id: Uuid, pretty: bool) -> Result<()> {
    let store = ivs::build_store(config)?;
    let orchestrator = ivs::build_orchestrator(config, store.clone())
        .context("Failed to build orchestrator")?;
    let dispatcher = Dispatcher::new(Arc::new(orchestrator));

    dispatcher.resubmit(id).await?;
    dispatcher.shutdown().await;

    let submission = store
        .get_submission(id)
        .await?
        .with_context(|| format!("Submission {id} disappeared"))?;
    print_json(&submission, pretty)
}

async fn sweep(config: &IvsConfig, watch: bool, pretty: bool) -> Result<()> {
    let reconciler = ivs::build_reconciler(config, ivs::build_store(config)?)?;

    if !watch {
        let failed = reconciler.sweep_once().await?;
        return print_json(&serde_json::json!({ "failed": failed }), pretty);
    }

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            cancel_clone.cancel();
        }
    });

    reconciler.run(cancel).await;
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}
