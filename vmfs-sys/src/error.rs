// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;
use vmfs_contracts::{HostError, HostErrorKind};
use vmfs_types::DatastoreId;

/// Error types for host tooling invocations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Required tool not found: {0}")]
    ToolMissing(String),

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Unexpected output from {command}: {reason}")]
    Parse { command: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("VMFS volume {uuid} was left on the host: {source}")]
    VolumeLeftBehind {
        uuid: String,
        #[source]
        source: Box<SysError>,
    },
}

/// Result type alias for host tooling operations
pub type Result<T> = std::result::Result<T, SysError>;

impl SysError {
    fn kind(&self) -> HostErrorKind {
        match self {
            SysError::Io(error) if error.kind() == std::io::ErrorKind::PermissionDenied => {
                HostErrorKind::PermissionDenied
            }
            SysError::Io(_) | SysError::Parse { .. } => HostErrorKind::Internal,
            SysError::ToolMissing(_) => HostErrorKind::Unsupported,
            SysError::NotFound(_) => HostErrorKind::NotFound,
            SysError::Conflict(_) => HostErrorKind::Conflict,
            SysError::CommandFailed { stderr, .. } => classify_stderr(stderr),
            SysError::VolumeLeftBehind { source, .. } => source.kind(),
        }
    }
}

/// Map tool stderr onto the closest host error kind.
fn classify_stderr(stderr: &str) -> HostErrorKind {
    let lowered = stderr.to_ascii_lowercase();
    if lowered.contains("permission denied") || lowered.contains("not authorized") {
        HostErrorKind::PermissionDenied
    } else if lowered.contains("busy") || lowered.contains("in use") {
        HostErrorKind::Busy
    } else if lowered.contains("already exists") {
        HostErrorKind::Conflict
    } else if lowered.contains("invalid") {
        HostErrorKind::InvalidInput
    } else {
        HostErrorKind::Internal
    }
}

impl From<SysError> for HostError {
    fn from(error: SysError) -> Self {
        let host_error = HostError::new(error.kind(), error.to_string());
        match error {
            SysError::VolumeLeftBehind { uuid, .. } => {
                host_error.with_resource(DatastoreId::new(uuid))
            }
            _ => host_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_is_classified_into_host_error_kinds() {
        let busy = SysError::CommandFailed {
            command: "vmkfstools".to_string(),
            stderr: "Device or resource busy".to_string(),
        };
        assert_eq!(HostError::from(busy).kind, HostErrorKind::Busy);

        let generic = SysError::CommandFailed {
            command: "vim-cmd".to_string(),
            stderr: "vim.fault.PlatformConfigFault".to_string(),
        };
        assert_eq!(HostError::from(generic).kind, HostErrorKind::Internal);
    }

    #[test]
    fn volume_left_behind_names_the_volume() {
        let error = HostError::from(SysError::VolumeLeftBehind {
            uuid: "70bb22cc-33dd".to_string(),
            source: Box::new(SysError::CommandFailed {
                command: "vmkfstools -Z".to_string(),
                stderr: "Device or resource busy".to_string(),
            }),
        });
        assert_eq!(error.kind, HostErrorKind::Busy);
        assert_eq!(error.resource, Some(DatastoreId::new("70bb22cc-33dd")));
        assert!(error.message.contains("70bb22cc-33dd"));
    }

    #[test]
    fn not_found_stays_distinguishable() {
        let error = HostError::from(SysError::NotFound("datastore 5f1d".to_string()));
        assert!(error.is_not_found());
    }
}
