// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque reference to a host system (managed object id or FQDN).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostRef(String);

impl HostRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable host lookup input (datacenter + host name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostQuery {
    /// Datacenter name; `None` means the default (or only) datacenter
    pub datacenter: Option<String>,

    /// Host name as registered with the management plane
    pub name: String,
}

impl HostQuery {
    pub fn new(datacenter: Option<&str>, name: &str) -> Self {
        Self {
            datacenter: datacenter.map(str::to_string),
            name: name.to_string(),
        }
    }
}
