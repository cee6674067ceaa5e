//! Weibull plotting positions and recurrence-interval allocation.

use serde::Serialize;

/// Days per year in the daily-event estimator.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Weibull return interval `(n + 1) / rank`, in the units of `n`.
pub fn weibull_interval(n: usize, rank: usize) -> f64 {
    (n as f64 + 1.0) / rank as f64
}

/// Return interval in years for a daily event of `rank` in an `n_days` record.
pub fn event_interval_years(n_days: usize, rank: usize) -> f64 {
    weibull_interval(n_days, rank) / DAYS_PER_YEAR
}

/// Annual probability of exceedance for a return interval.
pub fn exceedance_probability(return_interval: f64) -> f64 {
    1.0 - (1.0 - 1.0 / return_interval)
}

/// A value with its rank and Weibull statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub rank: usize,
    pub return_interval: f64,
    pub probability: f64,
    pub item: T,
}

/// Sort `items` descending by `key` and attach ranks `1..=len`.
///
/// `interval` maps a rank to its return interval. Ties keep input order.
pub fn rank_descending<T, K, I>(mut items: Vec<T>, key: K, interval: I) -> Vec<Ranked<T>>
where
    K: Fn(&T) -> f64,
    I: Fn(usize) -> f64,
{
    items.sort_by(|a, b| key(b).total_cmp(&key(a)));
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let rank = i + 1;
            let return_interval = interval(rank);
            Ranked {
                rank,
                return_interval,
                probability: exceedance_probability(return_interval),
                item,
            }
        })
        .collect()
}

/// Assign a rank to each target recurrence interval.
///
/// `intervals[k - 1]` is `T_k`, non-increasing in `k`. Targets are handled in
/// ascending order; each gets the largest `k` with `T_k >= target` that is
/// smaller than every rank already handed out, so no two targets share an
/// event. Results are returned in the order `targets` were given.
pub fn allocate_recurrence(intervals: &[f64], targets: &[f64]) -> Vec<(f64, Option<usize>)> {
    let mut order: Vec<usize> = (0..targets.len()).collect();
    order.sort_by(|&a, &b| targets[a].total_cmp(&targets[b]));

    let mut assigned = vec![None; targets.len()];
    let mut ceiling = intervals.len() + 1;
    for idx in order {
        let target = targets[idx];
        let meets = intervals.iter().take_while(|&&t| t >= target).count();
        let k = meets.min(ceiling - 1);
        if k >= 1 {
            assigned[idx] = Some(k);
            ceiling = k;
        }
    }
    targets.iter().copied().zip(assigned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn twenty_fire_years() {
        let intervals: Vec<f64> = (1..=20).map(|k| weibull_interval(20, k)).collect();
        let got = allocate_recurrence(&intervals, &[2.0, 5.0, 10.0, 20.0, 50.0, 100.0]);
        assert_eq!(
            got,
            vec![
                (2.0, Some(10)),
                (5.0, Some(4)),
                (10.0, Some(2)),
                (20.0, Some(1)),
                (50.0, None),
                (100.0, None),
            ]
        );
        assert_relative_eq!(intervals[9], 2.1);
        assert_relative_eq!(intervals[3], 5.25);
    }

    #[test]
    fn targets_never_share_a_rank() {
        let intervals: Vec<f64> = (1..=3).map(|k| weibull_interval(3, k)).collect();
        // T = 4, 2, 1.33
        let got = allocate_recurrence(&intervals, &[2.0, 2.5, 3.0]);
        assert_eq!(got, vec![(2.0, Some(2)), (2.5, Some(1)), (3.0, None)]);
    }

    #[test]
    fn unordered_targets_keep_input_order() {
        let intervals: Vec<f64> = (1..=20).map(|k| weibull_interval(20, k)).collect();
        let got = allocate_recurrence(&intervals, &[10.0, 2.0]);
        assert_eq!(got, vec![(10.0, Some(2)), (2.0, Some(10))]);
    }

    #[test]
    fn empty_series_allocates_nothing() {
        assert_eq!(allocate_recurrence(&[], &[2.0]), vec![(2.0, None)]);
    }

    #[test]
    fn ranking_sorts_descending() {
        let ranked = rank_descending(vec![1.0, 5.0, 3.0], |v| *v, |k| weibull_interval(3, k));
        let values: Vec<f64> = ranked.iter().map(|r| r.item).collect();
        assert_eq!(values, vec![5.0, 3.0, 1.0]);
        assert_eq!(ranked[0].rank, 1);
        assert_relative_eq!(ranked[0].return_interval, 4.0);
        assert_relative_eq!(ranked[0].probability, 0.25);
    }

    #[test]
    fn daily_interval_in_years() {
        assert_relative_eq!(event_interval_years(3652, 1), 3653.0 / 365.25);
    }
}
