//! Iteration budget with bounded mid-run extension
//!
//! The initial budget is the smaller of the configured ceiling and the
//! task-provided hint (default 12). Extension is tested once per
//! iteration after tool execution; the ceiling only ever grows.

use tracing::debug;

/// Iterations added per extension
const EXTENSION_STEP: u32 = 5;

/// Default budget when the task provides no hint
const DEFAULT_HINT: u32 = 12;

/// Grow-only iteration budget
#[derive(Debug, Clone)]
pub struct IterationBudget {
    max_iterations: u32,
    extensions: u32,
    stuck_threshold: u32,
}

impl IterationBudget {
    /// Initial budget = min(configured max, hint or 12)
    pub fn new(configured_max: u32, hint: Option<u32>, stuck_threshold: u32) -> Self {
        let max_iterations = configured_max.min(hint.unwrap_or(DEFAULT_HINT));
        Self {
            max_iterations,
            extensions: 0,
            stuck_threshold,
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn extensions(&self) -> u32 {
        self.extensions
    }

    /// Test extension after one iteration's tools ran
    ///
    /// Extends by 5 when the run is within one iteration of the ceiling
    /// AND shows recent progress or a recent signal. A run stuck past the
    /// threshold without a recent signal never extends. Monotone: the
    /// ceiling never decreases.
    pub fn maybe_extend(
        &mut self,
        iteration: u32,
        recent_progress: bool,
        recent_signal: bool,
        stuck_count: u32,
    ) -> bool {
        if iteration + 1 < self.max_iterations {
            return false;
        }
        if stuck_count > self.stuck_threshold && !recent_signal {
            debug!(stuck_count, "IterationBudget: stuck without signal, refusing extension");
            return false;
        }
        if !recent_progress && !recent_signal {
            return false;
        }

        self.max_iterations += EXTENSION_STEP;
        self.extensions += 1;
        debug!(new_max = self.max_iterations, "IterationBudget: extended");
        true
    }
}

/// Value at the p-th percentile of `values` (p in [0, 1])
///
/// Sorts an ascending copy and returns the element at `ceil(p * N) - 1`.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (p.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.saturating_sub(1).min(sorted.len() - 1)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_budget_is_min_of_max_and_hint() {
        assert_eq!(IterationBudget::new(20, Some(8), 3).max_iterations(), 8);
        assert_eq!(IterationBudget::new(6, Some(15), 3).max_iterations(), 6);
        assert_eq!(IterationBudget::new(20, None, 3).max_iterations(), 12);
    }

    #[test]
    fn test_extends_near_ceiling_with_progress() {
        let mut budget = IterationBudget::new(20, Some(10), 3);
        assert!(budget.maybe_extend(9, true, false, 0));
        assert_eq!(budget.max_iterations(), 15);
        assert_eq!(budget.extensions(), 1);
    }

    #[test]
    fn test_no_extension_far_from_ceiling() {
        let mut budget = IterationBudget::new(20, Some(10), 3);
        assert!(!budget.maybe_extend(3, true, true, 0));
        assert_eq!(budget.max_iterations(), 10);
    }

    #[test]
    fn test_no_extension_without_progress_or_signal() {
        let mut budget = IterationBudget::new(20, Some(10), 3);
        assert!(!budget.maybe_extend(9, false, false, 0));
    }

    #[test]
    fn test_signal_alone_is_enough() {
        let mut budget = IterationBudget::new(20, Some(10), 3);
        assert!(budget.maybe_extend(9, false, true, 0));
    }

    #[test]
    fn test_stuck_without_signal_never_extends() {
        let mut budget = IterationBudget::new(20, Some(10), 3);
        assert!(!budget.maybe_extend(9, true, false, 4));
        // A recent signal overrides the stuck veto
        assert!(budget.maybe_extend(9, false, true, 4));
    }

    #[test]
    fn test_extension_is_monotone() {
        let mut budget = IterationBudget::new(100, Some(10), 3);
        let mut previous = budget.max_iterations();
        for iteration in 9..40 {
            budget.maybe_extend(iteration, true, true, 0);
            assert!(budget.max_iterations() >= previous);
            previous = budget.max_iterations();
        }
    }

    #[test]
    fn test_percentile_law() {
        let values = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile(&values, 0.5), Some(30.0));
        assert_eq!(percentile(&values, 1.0), Some(50.0));
        assert_eq!(percentile(&values, 0.01), Some(10.0));
    }

    #[test]
    fn test_percentile_unsorted_input_and_empty() {
        let values = vec![50.0, 10.0, 30.0];
        assert_eq!(percentile(&values, 0.34), Some(30.0));
        assert_eq!(percentile(&[], 0.5), None);
    }
}
