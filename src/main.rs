use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use imagesmith_compute::{InMemoryCompute, Inventory};
use imagesmith_config::WorkflowDef;
use imagesmith_workflow::{Workflow, random_suffix, resolve_name};

/// Imagesmith - teardown steps for image-build workflows
#[derive(Parser)]
#[command(name = "imagesmith")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.imagesmith)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Inventory of existing resources for the simulator
  /// (default: <data-dir>/inventory.json)
  #[arg(long, global = true)]
  inventory: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Validate a workflow against the inventory
  Validate {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// Run suffix to resolve resource names with
    #[arg(long)]
    suffix: Option<String>,
  },

  /// Validate and run a workflow against the inventory
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// Run suffix to resolve resource names with
    #[arg(long)]
    suffix: Option<String>,

    /// Simulated latency per compute call, in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Give up waiting for an instance to stop after this many seconds
    #[arg(long, default_value_t = 600)]
    wait_timeout_secs: u64,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".imagesmith"),
  };
  let inventory_file = cli
    .inventory
    .unwrap_or_else(|| data_dir.join("inventory.json"));

  let rt = tokio::runtime::Runtime::new()?;

  match cli.command {
    Some(Commands::Validate {
      workflow_file,
      suffix,
    }) => rt.block_on(validate_workflow(&workflow_file, &inventory_file, suffix)),
    Some(Commands::Run {
      workflow_file,
      suffix,
      latency_ms,
      wait_timeout_secs,
    }) => rt.block_on(run_workflow(
      &workflow_file,
      &inventory_file,
      suffix,
      Simulation {
        latency: Duration::from_millis(latency_ms),
        wait_timeout: Duration::from_secs(wait_timeout_secs),
      },
    )),
    None => {
      println!("imagesmith - use --help to see available commands");
      Ok(())
    }
  }
}

async fn validate_workflow(
  workflow_file: &Path,
  inventory_file: &Path,
  suffix: Option<String>,
) -> Result<()> {
  let workflow = load_workflow(
    workflow_file,
    inventory_file,
    suffix,
    Simulation::default(),
  )
  .await?;

  workflow
    .validate()
    .await
    .context("workflow validation failed")?;

  eprintln!(
    "Workflow '{}' is valid ({} steps)",
    workflow.name(),
    workflow.steps().len()
  );
  Ok(())
}

async fn run_workflow(
  workflow_file: &Path,
  inventory_file: &Path,
  suffix: Option<String>,
  simulation: Simulation,
) -> Result<()> {
  let workflow = load_workflow(workflow_file, inventory_file, suffix, simulation).await?;

  workflow
    .validate()
    .await
    .context("workflow validation failed")?;

  // Ctrl-C cancels the run; steps stop at their next join point.
  let cancel = workflow.cancel_token();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, cancelling workflow");
      cancel.cancel();
    }
  });

  workflow.run().await.context("workflow execution failed")?;

  let output = serde_json::json!({
    "workflow": workflow.name(),
    "suffix": workflow.suffix(),
    "steps": workflow.steps().keys().collect::<Vec<_>>(),
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

/// Timing knobs for the simulated compute backend.
#[derive(Default)]
struct Simulation {
  latency: Duration,
  wait_timeout: Duration,
}

/// Read the workflow and inventory and build a run against the simulator.
async fn load_workflow(
  workflow_file: &Path,
  inventory_file: &Path,
  suffix: Option<String>,
  simulation: Simulation,
) -> Result<Workflow> {
  let workflow_content = tokio::fs::read_to_string(workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  let def = WorkflowDef::from_json(&workflow_content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  let inventory_content = tokio::fs::read_to_string(inventory_file)
    .await
    .with_context(|| format!("failed to read inventory file: {}", inventory_file.display()))?;

  let inventory: Inventory = serde_json::from_str(&inventory_content)
    .with_context(|| format!("failed to parse inventory file: {}", inventory_file.display()))?;

  let suffix = suffix.unwrap_or_else(random_suffix);
  let mut compute = InMemoryCompute::from_inventory(&inventory, |name| {
    resolve_name(name, &def.name, &suffix)
  })
  .with_latency(simulation.latency);
  if !simulation.wait_timeout.is_zero() {
    compute = compute.with_wait_timeout(simulation.wait_timeout);
  }

  info!(
    workflow = %def.name,
    suffix = %suffix,
    steps = def.steps.len(),
    "loaded workflow"
  );

  Ok(Workflow::with_suffix(def, Arc::new(compute), suffix))
}
