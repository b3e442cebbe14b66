//! Traffic usage reports.

use serde::Serialize;

use crate::backend::Credential;

/// How much of their quota a user has consumed, next to backend peers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub label: String,
    pub backend: String,
    pub used_bytes: u64,
    pub limit_bytes: u64,
    /// Share of the quota used, in percent, two decimals.
    pub used_percent: f64,
    /// Median over credentials on the same backend with non-zero usage.
    pub median_bytes: u64,
    /// Mean over credentials on the same backend with non-zero usage.
    pub mean_bytes: u64,
}

impl UsageReport {
    /// Build a report for `label` from one backend's credential list.
    ///
    /// Returns `None` unless exactly one credential carries the label.
    pub fn compute(
        label: &str,
        backend: &str,
        credentials: &[Credential],
        limit_bytes: u64,
    ) -> Option<Self> {
        let mut matching = credentials.iter().filter(|c| c.label == label);
        let own = matching.next()?;
        if matching.next().is_some() {
            tracing::warn!(backend = %backend, label = %label, "Several credentials share one label");
            return None;
        }

        let used_bytes = own.used_bytes.unwrap_or(0);
        let used_percent = if limit_bytes == 0 {
            0.0
        } else {
            round2(used_bytes as f64 / limit_bytes as f64 * 100.0)
        };

        let mut peers: Vec<u64> = credentials
            .iter()
            .filter_map(|c| c.used_bytes)
            .filter(|&b| b > 0)
            .collect();
        peers.sort_unstable();

        Some(Self {
            label: label.to_string(),
            backend: backend.to_string(),
            used_bytes,
            limit_bytes,
            used_percent,
            median_bytes: median(&peers),
            mean_bytes: mean(&peers),
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn median(sorted: &[u64]) -> u64 {
    match sorted.len() {
        0 => 0,
        n if n % 2 == 1 => sorted[n / 2],
        n => ((sorted[n / 2 - 1] as u128 + sorted[n / 2] as u128) / 2) as u64,
    }
}

fn mean(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let sum: u128 = values.iter().map(|&v| v as u128).sum();
    (sum / values.len() as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(id: &str, label: &str, used: Option<u64>) -> Credential {
        Credential {
            id: id.into(),
            label: label.into(),
            access_url: format!("ss://{}", id),
            used_bytes: used,
        }
    }

    #[test]
    fn test_report() {
        let creds = vec![
            cred("0", "me", Some(250)),
            cred("1", "a", Some(100)),
            cred("2", "b", None),
            cred("3", "c", Some(0)),
            cred("4", "d", Some(1000)),
        ];
        let report = UsageReport::compute("me", "b1", &creds, 1000).unwrap();
        assert_eq!(report.used_bytes, 250);
        assert_eq!(report.used_percent, 25.0);
        assert_eq!(report.median_bytes, 250);
        assert_eq!(report.mean_bytes, 450);
        assert_eq!(report.backend, "b1");
    }

    #[test]
    fn test_no_usage_reported() {
        let creds = vec![cred("0", "me", None)];
        let report = UsageReport::compute("me", "b1", &creds, 3).unwrap();
        assert_eq!(report.used_bytes, 0);
        assert_eq!(report.used_percent, 0.0);
        assert_eq!(report.median_bytes, 0);
        assert_eq!(report.mean_bytes, 0);
    }

    #[test]
    fn test_rounding() {
        let creds = vec![cred("0", "me", Some(1))];
        let report = UsageReport::compute("me", "b1", &creds, 3).unwrap();
        assert_eq!(report.used_percent, 33.33);
    }

    #[test]
    fn test_missing_or_ambiguous() {
        let creds = vec![cred("0", "x", None), cred("1", "dup", None), cred("2", "dup", None)];
        assert!(UsageReport::compute("me", "b1", &creds, 10).is_none());
        assert!(UsageReport::compute("dup", "b1", &creds, 10).is_none());
    }

    #[test]
    fn test_even_median() {
        assert_eq!(median(&[10, 20]), 15);
        assert_eq!(median(&[1, 2]), 1);
        assert_eq!(median(&[3, 5]), 4);
        assert_eq!(median(&[u64::MAX, u64::MAX]), u64::MAX);
    }
}
