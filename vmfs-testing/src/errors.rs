// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TestingError {
    #[error("acceptance config not found at {path:?}")]
    ConfigNotFound { path: PathBuf },
    #[error("invalid acceptance config: {reason}")]
    ConfigInvalid { reason: String },
    #[error("backend unavailable: {reason}")]
    BackendUnavailable { reason: String },
    #[error("no tests selected for current filters")]
    NoTestsSelected,
    #[error("artifact io error for {path:?}: {reason}")]
    ArtifactIo { path: PathBuf, reason: String },
    #[error("harness worker failed: {reason}")]
    Worker { reason: String },
    #[error("skipped: {reason}")]
    TestSkipped { reason: String },
    #[error("failed: {reason}")]
    TestFailed { reason: String },
}

pub type Result<T> = std::result::Result<T, TestingError>;
