//! Immutable view of the backend pool.

use std::collections::HashSet;

/// The backend addresses in force at one point in time.
///
/// Order is the order of the source file and decides probe precedence.
/// Addresses are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    version: u64,
    servers: Vec<String>,
}

impl PoolSnapshot {
    /// Build a snapshot, dropping repeated addresses (first one wins).
    pub fn new(version: u64, servers: Vec<String>) -> Self {
        Self {
            version,
            servers: dedupe(servers),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Set equality: same addresses, order ignored.
    pub fn same_servers(&self, other: &[String]) -> bool {
        let ours: HashSet<&str> = self.servers.iter().map(String::as_str).collect();
        let theirs: HashSet<&str> = other.iter().map(String::as_str).collect();
        ours == theirs
    }
}

fn dedupe(servers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(servers.len());
    servers
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
