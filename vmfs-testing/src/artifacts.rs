// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TestingError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIndex {
    pub run_label: String,
    pub run_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Default artifact root below the workspace target directory.
pub fn artifacts_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../target/vmfs-testing/artifacts")
}

/// Create `<root>/<label>-<timestamp>` with an `index.json` describing the run.
pub fn run_dir(root: &Path, run_label: &str) -> Result<PathBuf> {
    let started_at = chrono::Utc::now();
    let run_id = started_at.format("%Y%m%dT%H%M%S%.3fZ").to_string();

    let dir = root.join(format!("{run_label}-{run_id}"));
    fs::create_dir_all(&dir).map_err(|error| TestingError::ArtifactIo {
        path: dir.clone(),
        reason: error.to_string(),
    })?;

    let index = RunIndex {
        run_label: run_label.to_string(),
        run_id,
        started_at,
    };
    write_json(&dir.join("index.json"), &index)?;

    Ok(dir)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(|error| TestingError::ArtifactIo {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;

    fs::write(path, content).map_err(|error| TestingError::ArtifactIo {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}
