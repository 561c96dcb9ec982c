use crate::services::endpoint_monitor::{EndpointStatusSnapshot, Status};

/// The healthy endpoint with the highest observed block height. Ties are
/// broken by lowest latency, then by stable input order (§4.7 step 2).
pub fn select_best<'a>(statuses: &'a [EndpointStatusSnapshot]) -> Option<&'a EndpointStatusSnapshot> {
    let mut best: Option<&EndpointStatusSnapshot> = None;

    for candidate in statuses {
        if candidate.status != Status::Active {
            continue;
        }
        let Some(height) = candidate.block_height else { continue };

        best = match best {
            None => Some(candidate),
            Some(current) => {
                let current_height = current.block_height.unwrap_or(0);
                if height > current_height {
                    Some(candidate)
                } else if height == current_height {
                    let current_latency = current.latency_ms.unwrap_or(i64::MAX);
                    let candidate_latency = candidate.latency_ms.unwrap_or(i64::MAX);
                    if candidate_latency < current_latency {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                } else {
                    Some(current)
                }
            }
        };
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(url: &str, height: u64, latency_ms: i64) -> EndpointStatusSnapshot {
        EndpointStatusSnapshot {
            url: url.to_string(),
            chain_id: 51,
            status: Status::Active,
            latency_ms: Some(latency_ms),
            block_height: Some(height),
        }
    }

    #[test]
    fn picks_highest_height() {
        let statuses = vec![snapshot("e1", 10_000, 120), snapshot("e2", 10_000, 300), snapshot("e3", 9_950, 150)];
        let best = select_best(&statuses).unwrap();
        assert_eq!(best.url, "e1");
    }

    #[test]
    fn ties_broken_by_lowest_latency() {
        let statuses = vec![snapshot("e1", 10_000, 300), snapshot("e2", 10_000, 120)];
        let best = select_best(&statuses).unwrap();
        assert_eq!(best.url, "e2");
    }

    #[test]
    fn failed_endpoints_are_excluded() {
        let mut statuses = vec![snapshot("e1", 10_000, 120)];
        statuses[0].status = Status::Failed;
        assert!(select_best(&statuses).is_none());
    }

    #[test]
    fn no_healthy_endpoint_returns_none() {
        assert!(select_best(&[]).is_none());
    }
}
