// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vmfs_testing::artifacts;
use vmfs_testing::config::{AcceptanceConfig, BackendKind};
use vmfs_testing::harness::{self, CaseStatus, RunConfig};
use vmfs_testing::scenarios;

#[derive(Debug, Parser)]
#[command(name = "harness")]
#[command(about = "Acceptance harness for the VMFS datastore reconciler")]
struct HarnessCli {
    #[command(subcommand)]
    command: HarnessCommand,
}

#[derive(Debug, Subcommand)]
enum HarnessCommand {
    /// Run the acceptance scenarios
    Run {
        /// TOML acceptance config; the simulated fixture is used when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        suite: Option<String>,
        #[arg(long)]
        test: Option<String>,
        /// Override the backend named in the config
        #[arg(long, value_parser = parse_backend)]
        backend: Option<BackendKind>,
        #[arg(long, default_value_t = 1)]
        parallel: usize,
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },
    /// List registered scenarios
    List,
}

fn parse_backend(raw: &str) -> Result<BackendKind, String> {
    match raw {
        "simulated" => Ok(BackendKind::Simulated),
        "esxcli" => Ok(BackendKind::Esxcli),
        other => Err(format!("unknown backend '{other}' (simulated, esxcli)")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vmfs_testing=info,vmfs_reconciler=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = HarnessCli::parse();

    match cli.command {
        HarnessCommand::List => {
            for test in scenarios::instantiate_tests() {
                println!("{}\t{}", test.suite(), test.id());
            }
            Ok(ExitCode::SUCCESS)
        }
        HarnessCommand::Run {
            config,
            suite,
            test,
            backend,
            parallel,
            artifacts: artifact_root,
        } => {
            let mut acceptance = match &config {
                Some(path) => AcceptanceConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => AcceptanceConfig::simulated(),
            };
            if let Some(backend) = backend {
                acceptance.backend = backend;
            }

            let run = RunConfig {
                suite,
                test_id: test,
                max_parallel_groups: parallel,
                artifact_root: Some(artifact_root.unwrap_or_else(artifacts::artifacts_root)),
            };
            let summary = harness::run_all(acceptance, run)
                .await
                .context("acceptance run failed")?;

            println!(
                "passed: {}, failed: {}, skipped: {}",
                summary.count(|status| matches!(status, CaseStatus::Passed)),
                summary.count(|status| matches!(status, CaseStatus::Failed(_))),
                summary.count(|status| matches!(status, CaseStatus::Skipped(_))),
            );
            if let Some(dir) = &summary.artifact_dir {
                println!("artifacts: {}", dir.display());
            }

            Ok(if summary.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}
