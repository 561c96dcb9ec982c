use crate::services::endpoint_monitor::EndpointStatusSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagClass {
    Warning,
    Critical,
}

impl LagClass {
    pub fn classify(blocks_behind: u64) -> Option<Self> {
        if blocks_behind >= 1000 {
            Some(LagClass::Critical)
        } else if blocks_behind >= 100 {
            Some(LagClass::Warning)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LagClass::Warning => "warning",
            LagClass::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LagGroup {
    pub class: LagClass,
    pub count: usize,
    pub top: Vec<(String, u64, u64)>, // (url, blocks_behind, height)
    pub truncated: usize,
}

impl LagGroup {
    pub fn message(&self) -> String {
        let mut lines: Vec<String> = self
            .top
            .iter()
            .map(|(url, behind, height)| format!("- {url}: {behind} delay blocks (at block {height})"))
            .collect();
        if self.truncated > 0 {
            lines.push(format!("... and {} more", self.truncated));
        }
        lines.join("\n")
    }
}

/// Highest minus lowest observed height across endpoints this cycle; zero
/// when fewer than two endpoints were observed (§8 quantified invariant).
pub fn variance(statuses: &[EndpointStatusSnapshot]) -> u64 {
    let heights: Vec<u64> = statuses.iter().filter_map(|s| s.block_height).collect();
    if heights.len() < 2 {
        return 0;
    }
    let max = heights.iter().copied().max().unwrap();
    let min = heights.iter().copied().min().unwrap();
    max - min
}

/// Dual-threshold sync-lag detection, aggregated into at most one group per
/// classification per cycle (§4.7.2).
pub fn detect(statuses: &[EndpointStatusSnapshot]) -> Vec<LagGroup> {
    let Some(highest) = statuses.iter().filter_map(|s| s.block_height).max() else {
        return Vec::new();
    };

    let mut warning: Vec<(String, u64, u64)> = Vec::new();
    let mut critical: Vec<(String, u64, u64)> = Vec::new();

    for status in statuses {
        let Some(height) = status.block_height else { continue };
        let behind = highest.saturating_sub(height);
        match LagClass::classify(behind) {
            Some(LagClass::Warning) => warning.push((status.url.clone(), behind, height)),
            Some(LagClass::Critical) => critical.push((status.url.clone(), behind, height)),
            None => {}
        }
    }

    let mut groups = Vec::new();
    for (class, mut entries) in [(LagClass::Critical, critical), (LagClass::Warning, warning)] {
        if entries.is_empty() {
            continue;
        }
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        let count = entries.len();
        let truncated = count.saturating_sub(5);
        entries.truncate(5);
        groups.push(LagGroup { class, count, top: entries, truncated });
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::endpoint_monitor::Status;

    fn snap(url: &str, height: u64) -> EndpointStatusSnapshot {
        EndpointStatusSnapshot { url: url.to_string(), chain_id: 50, status: Status::Active, latency_ms: None, block_height: Some(height) }
    }

    #[test]
    fn boundary_99_is_no_alert_100_is_warning() {
        assert_eq!(LagClass::classify(99), None);
        assert_eq!(LagClass::classify(100), Some(LagClass::Warning));
        assert_eq!(LagClass::classify(999), Some(LagClass::Warning));
        assert_eq!(LagClass::classify(1000), Some(LagClass::Critical));
    }

    #[test]
    fn scenario_b_two_groups_two_members_each() {
        let statuses = vec![
            snap("E1", 20_000),
            snap("E2", 19_800),
            snap("E3", 19_850),
            snap("E4", 20_000),
            snap("E5", 19_000),
            snap("E6", 18_500),
        ];
        let groups = detect(&statuses);
        assert_eq!(groups.len(), 2);

        let critical = groups.iter().find(|g| g.class == LagClass::Critical).unwrap();
        assert_eq!(critical.count, 2);
        assert!(critical.top.iter().any(|(url, _, _)| url == "E6"));
        assert!(critical.top.iter().any(|(url, _, _)| url == "E5"));

        let warning = groups.iter().find(|g| g.class == LagClass::Warning).unwrap();
        assert_eq!(warning.count, 2);
    }

    #[test]
    fn scenario_a_no_group_when_max_behind_under_100() {
        let statuses = vec![snap("E1", 10_000), snap("E2", 10_000), snap("E3", 9_950)];
        assert!(detect(&statuses).is_empty());
        assert_eq!(variance(&statuses), 50);
    }

    #[test]
    fn variance_is_zero_with_fewer_than_two_endpoints() {
        assert_eq!(variance(&[snap("E1", 100)]), 0);
        assert_eq!(variance(&[]), 0);
    }
}
