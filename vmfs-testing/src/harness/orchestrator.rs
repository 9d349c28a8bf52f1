// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant, timeout};

use crate::artifacts;
use crate::config::{AcceptanceConfig, BackendKind};
use crate::errors::{Result, TestingError};
use crate::harness::{HarnessContext, HostBackend, TestRef};
use crate::scenarios;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub suite: Option<String>,
    pub test_id: Option<String>,
    pub max_parallel_groups: usize,
    /// Where run artifacts go; `None` skips writing them
    pub artifact_root: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            suite: None,
            test_id: None,
            max_parallel_groups: 1,
            artifact_root: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    Passed,
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResultRecord {
    pub id: String,
    pub suite: String,
    pub status: CaseStatus,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResultRecord {
    pub suite: String,
    pub tests: Vec<TestResultRecord>,
    pub setup_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub groups: Vec<GroupResultRecord>,
    pub artifact_dir: Option<PathBuf>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.groups.iter().any(|group| {
            group.setup_error.is_some()
                || group
                    .tests
                    .iter()
                    .any(|test| matches!(test.status, CaseStatus::Failed(_)))
        })
    }

    pub fn count(&self, predicate: impl Fn(&CaseStatus) -> bool) -> usize {
        self.groups
            .iter()
            .flat_map(|group| &group.tests)
            .filter(|test| predicate(&test.status))
            .count()
    }

    pub fn status_of(&self, id: &str) -> Option<&CaseStatus> {
        self.groups
            .iter()
            .flat_map(|group| &group.tests)
            .find(|test| test.id == id)
            .map(|test| &test.status)
    }
}

async fn execute_test_case(test: TestRef, ctx: &HarnessContext) -> TestResultRecord {
    tracing::info!("[{}] START {}", test.suite(), test.id());
    let started = Instant::now();
    let limit = Duration::from_secs(ctx.config.test_timeout_secs.max(1));

    let status = match timeout(limit, test.execute(ctx)).await {
        Ok(Ok(())) => CaseStatus::Passed,
        Ok(Err(TestingError::TestSkipped { reason })) => CaseStatus::Skipped(reason),
        Ok(Err(error)) => CaseStatus::Failed(error.to_string()),
        Err(_) => CaseStatus::Failed(format!("test timed out after {}s", limit.as_secs())),
    };

    let elapsed_ms = started.elapsed().as_millis();
    match &status {
        CaseStatus::Passed => tracing::info!("[{}] PASS {} ({} ms)", test.suite(), test.id(), elapsed_ms),
        CaseStatus::Skipped(reason) => {
            tracing::info!("[{}] SKIP {} ({} ms): {}", test.suite(), test.id(), elapsed_ms, reason)
        }
        CaseStatus::Failed(reason) => {
            tracing::error!("[{}] FAIL {} ({} ms): {}", test.suite(), test.id(), elapsed_ms, reason)
        }
    }

    TestResultRecord {
        id: test.id().to_string(),
        suite: test.suite().to_string(),
        status,
        elapsed_ms,
    }
}

async fn run_group(suite: String, tests: Vec<TestRef>, config: AcceptanceConfig) -> GroupResultRecord {
    let mut group = GroupResultRecord {
        suite,
        tests: Vec::new(),
        setup_error: None,
    };

    let backend = match HostBackend::connect(&config) {
        Ok(backend) => backend,
        Err(error) => {
            group.setup_error = Some(error.to_string());
            return group;
        }
    };
    let ctx = HarnessContext::new(config, backend);

    for test in tests {
        group.tests.push(execute_test_case(test, &ctx).await);
    }
    group
}

/// Run every built-in scenario matching `run`.
pub async fn run_all(config: AcceptanceConfig, run: RunConfig) -> Result<RunSummary> {
    run_tests(scenarios::instantiate_tests(), config, run).await
}

pub async fn run_tests(
    tests: Vec<TestRef>,
    config: AcceptanceConfig,
    run: RunConfig,
) -> Result<RunSummary> {
    let selected = filter_tests(tests, run.suite.as_deref(), run.test_id.as_deref());
    if selected.is_empty() {
        return Err(TestingError::NoTestsSelected);
    }

    let artifact_dir = match &run.artifact_root {
        Some(root) => Some(artifacts::run_dir(root, "harness")?),
        None => None,
    };

    // A real host is shared by every suite, so its groups never overlap.
    let max_parallel = match config.backend {
        BackendKind::Simulated => run.max_parallel_groups.max(1),
        BackendKind::Esxcli => 1,
    };
    let semaphore = Arc::new(Semaphore::new(max_parallel));
    let mut set = JoinSet::new();

    for (suite, tests) in group_by_suite(selected) {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|error| TestingError::Worker {
                reason: format!("harness semaphore closed: {error}"),
            })?;
        let config = config.clone();
        set.spawn(async move {
            let _permit = permit;
            run_group(suite, tests, config).await
        });
    }

    let mut groups = Vec::new();
    while let Some(joined) = set.join_next().await {
        groups.push(joined.map_err(|error| TestingError::Worker {
            reason: format!("harness worker task failed: {error}"),
        })?);
    }
    groups.sort_by(|left, right| left.suite.cmp(&right.suite));

    let summary = RunSummary {
        groups,
        artifact_dir,
    };

    if let Some(dir) = &summary.artifact_dir {
        for group in &summary.groups {
            artifacts::write_json(
                &dir.join(format!("group-{}.json", sanitize_name(&group.suite))),
                group,
            )?;
        }
        artifacts::write_json(&dir.join("run-summary.json"), &summary)?;
    }

    Ok(summary)
}

fn filter_tests(tests: Vec<TestRef>, suite: Option<&str>, test_id: Option<&str>) -> Vec<TestRef> {
    tests
        .into_iter()
        .filter(|test| suite.is_none_or(|value| test.suite() == value))
        .filter(|test| test_id.is_none_or(|value| test.id() == value))
        .collect()
}

/// Group by suite, keeping registration order inside each suite.
fn group_by_suite(tests: Vec<TestRef>) -> Vec<(String, Vec<TestRef>)> {
    let mut groups: Vec<(String, Vec<TestRef>)> = Vec::new();
    for test in tests {
        let suite = test.suite().to_string();
        if let Some((_, group_tests)) = groups.iter_mut().find(|(value, _)| *value == suite) {
            group_tests.push(test);
        } else {
            groups.push((suite, vec![test]));
        }
    }
    groups
}

fn sanitize_name(value: &str) -> String {
    value
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() || character == '-' || character == '_' {
                character
            } else {
                '_'
            }
        })
        .collect()
}
