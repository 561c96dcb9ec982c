/// Index difference between `expected` and `actual` in a masternode list
/// (§4.8 step 3, Scenario E). The raw index difference wraps around the
/// list in one direction or the other; the monitor takes whichever
/// direction is shorter ("the forward path") rather than the full
/// wrapped distance the other way round.
pub fn skipped_count(masternodes: &[String], expected: &str, actual: &str) -> Option<u64> {
    let len = masternodes.len();
    if len == 0 {
        return None;
    }
    let expected_idx = masternodes.iter().position(|m| m == expected)?;
    let actual_idx = masternodes.iter().position(|m| m == actual)?;

    let diff = expected_idx.abs_diff(actual_idx);
    let forward = diff.min(len - diff);

    Some(forward as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> Vec<String> {
        (0..10).map(|i| format!("M{i}")).collect()
    }

    #[test]
    fn scenario_e_forward_wraparound_is_two() {
        // M0..M9, expected=M5, actual=M3: forward path wraps 5->9->0->3 = 2 skipped after wrap.
        assert_eq!(skipped_count(&list(), "M5", "M3"), Some(2));
    }

    #[test]
    fn no_wraparound_when_actual_ahead_of_expected() {
        assert_eq!(skipped_count(&list(), "M2", "M5"), Some(3));
    }

    #[test]
    fn unknown_miner_returns_none() {
        assert_eq!(skipped_count(&list(), "M2", "M99"), None);
    }
}
