//! JSON output structures for the ferrosync CLI

use ferrosync_sync::SyncResult;
use serde::Serialize;

/// Complete JSON output of a `sync` or `run` invocation
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// ferrosync version
    pub version: String,
    /// Local root
    pub local_dir: String,
    /// Remote root
    pub remote_dir: String,
    /// One entry per server, in sync order
    pub servers: Vec<ServerReport>,
}

/// Outcome for one server
#[derive(Debug, Serialize)]
pub struct ServerReport {
    /// Server host
    pub host: String,
    /// Result when the pass got past the connection step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SyncResult>,
    /// Fatal error otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    /// Create an empty report
    pub fn new(local_dir: impl Into<String>, remote_dir: impl Into<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            local_dir: local_dir.into(),
            remote_dir: remote_dir.into(),
            servers: Vec::new(),
        }
    }

    /// Number of servers that failed before producing a result
    pub fn failed_servers(&self) -> usize {
        self.servers.iter().filter(|s| s.error.is_some()).count()
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
