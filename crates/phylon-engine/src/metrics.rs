//! Per-turn performance and outcome metrics.

/// Timing and outcome counters collected during one turn.
///
/// Durations are in microseconds. The engine fills the timing fields; the
/// simulation session adds the commit time and population counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnMetrics {
    /// Wall-clock time for the whole turn.
    pub total_us: u64,
    /// Per-stage execution time: `(name, microseconds)`, in run order.
    /// Skipped stages are absent.
    pub stage_us: Vec<(String, u64)>,
    /// Time spent committing species and events.
    pub commit_us: u64,
    /// Stages that completed or degraded.
    pub stages_run: u32,
    /// Stages that returned a recoverable failure.
    pub stages_failed: u32,
    /// Stages skipped because an upstream stage failed.
    pub stages_skipped: u32,
    /// Species records written back.
    pub species_updated: u32,
    /// Deaths across all species.
    pub deaths: u64,
    /// Species that went extinct.
    pub extinctions: u32,
}

impl TurnMetrics {
    /// Time spent in the named stage, if it ran.
    pub fn stage_time(&self, name: &str) -> Option<u64> {
        self.stage_us
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, us)| us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = TurnMetrics::default();
        assert_eq!(m.total_us, 0);
        assert!(m.stage_us.is_empty());
        assert_eq!(m.stages_run + m.stages_failed + m.stages_skipped, 0);
    }

    #[test]
    fn stage_time_lookup() {
        let m = TurnMetrics {
            stage_us: vec![("trophic".into(), 40), ("mortality".into(), 90)],
            ..TurnMetrics::default()
        };
        assert_eq!(m.stage_time("mortality"), Some(90));
        assert_eq!(m.stage_time("population"), None);
    }
}
