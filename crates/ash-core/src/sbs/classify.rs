//! Breakpoint classification of raw SBS pixel values.

/// Canonical BARC 0–255 breakpoints.
pub const BARC_BREAKS: [i32; 4] = [0, 75, 109, 187];
/// Breakpoints of an already classified 0–3 raster.
pub const FOUR_CLASS_BREAKS: [i32; 4] = [0, 1, 2, 3];

/// More unique values than this means a continuous (BARC) raster.
const MAX_CLASSED_UNIQUE: usize = 7;
/// A run of consecutive values from the minimum longer than this also means BARC.
const MAX_CLASSED_RUN: usize = 5;

/// Classify one pixel value.
///
/// Declared nodata values map to `offset` (unburned). Otherwise the result is
/// `offset + i` for the smallest `i` with `value <= breaks[i]`, and
/// `offset + 3` when the value exceeds every break.
pub fn classify(value: i32, breaks: &[i32; 4], nodata_vals: &[i32], offset: i32) -> i32 {
    if nodata_vals.contains(&value) {
        return offset;
    }
    breaks
        .iter()
        .position(|&b| value <= b)
        .map_or(offset + 3, |i| offset + i as i32)
}

/// How breakpoints were chosen for a raster without a usable palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakSelection {
    /// Continuous 0–255 index; [`BARC_BREAKS`].
    Barc,
    /// Classed raster; breaks end at the last value of the run from the minimum.
    Inferred([i32; 4]),
}

impl BreakSelection {
    pub fn breaks(&self) -> [i32; 4] {
        match self {
            Self::Barc => BARC_BREAKS,
            Self::Inferred(b) => *b,
        }
    }
}

/// Length of the run `min, min+1, …` present in a sorted, deduplicated slice.
pub fn consecutive_run_from_min(sorted_unique: &[i32]) -> usize {
    let Some(&min_val) = sorted_unique.first() else {
        return 0;
    };
    sorted_unique
        .iter()
        .enumerate()
        .take_while(|&(i, &v)| i64::from(v) == i64::from(min_val) + i as i64)
        .count()
}

/// Choose breakpoints from the sorted unique pixel values (nodata excluded).
///
/// Empty input falls back to the 4-class breaks.
pub fn infer_breaks(sorted_unique: &[i32]) -> BreakSelection {
    let Some(&min_val) = sorted_unique.first() else {
        return BreakSelection::Inferred(FOUR_CLASS_BREAKS);
    };
    let run = consecutive_run_from_min(sorted_unique);
    if run > MAX_CLASSED_RUN || sorted_unique.len() > MAX_CLASSED_UNIQUE {
        return BreakSelection::Barc;
    }
    let max_run_val = min_val + run as i32 - 1;
    BreakSelection::Inferred([max_run_val - 3, max_run_val - 2, max_run_val - 1, max_run_val])
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFSET: i32 = 130;

    #[test]
    fn standard_four_class() {
        let out: Vec<i32> = [0, 1, 2, 3, 4]
            .iter()
            .map(|&v| classify(v, &FOUR_CLASS_BREAKS, &[], OFFSET))
            .collect();
        assert_eq!(out, vec![130, 131, 132, 133, 133]);
    }

    #[test]
    fn barc_boundaries() {
        let inputs = [0, 1, 75, 76, 109, 110, 187, 188, 255];
        let out: Vec<i32> = inputs.iter().map(|&v| classify(v, &BARC_BREAKS, &[], OFFSET)).collect();
        assert_eq!(out, vec![130, 131, 131, 132, 132, 133, 133, 133, 133]);
    }

    #[test]
    fn barc_ranges_hold_everywhere() {
        for v in 0..=255 {
            let expected = match v {
                0 => 130,
                1..=75 => 131,
                76..=109 => 132,
                _ => 133,
            };
            assert_eq!(classify(v, &BARC_BREAKS, &[], OFFSET), expected, "v={v}");
        }
    }

    #[test]
    fn nodata_maps_to_unburned() {
        assert_eq!(classify(255, &FOUR_CLASS_BREAKS, &[255], OFFSET), 130);
        assert_eq!(classify(1, &FOUR_CLASS_BREAKS, &[255], OFFSET), 131);
    }

    #[test]
    fn zero_offset_stays_in_four_classes() {
        for v in -50..300 {
            let c = classify(v, &FOUR_CLASS_BREAKS, &[], 0);
            assert!((0..=3).contains(&c));
            if v >= 3 {
                assert_eq!(c, 3);
            }
            if v <= 0 {
                assert_eq!(c, 0);
            }
        }
    }

    #[test]
    fn non_sequential_classes_infer_shifted_breaks() {
        let sel = infer_breaks(&[0, 1, 3]);
        assert_eq!(sel, BreakSelection::Inferred([-2, -1, 0, 1]));
        let b = sel.breaks();
        assert_eq!(classify(0, &b, &[], OFFSET), 132);
        assert_eq!(classify(1, &b, &[], OFFSET), 133);
        assert_eq!(classify(3, &b, &[], OFFSET), 133);
    }

    #[test]
    fn contiguous_classes_are_identity() {
        // Four contiguous classes starting anywhere map onto 130..133 in order.
        for start in [0, 1, 5] {
            let vals: Vec<i32> = (start..start + 4).collect();
            let b = infer_breaks(&vals).breaks();
            let out: Vec<i32> = vals.iter().map(|&v| classify(v, &b, &[], OFFSET)).collect();
            assert_eq!(out, vec![130, 131, 132, 133], "start={start}");
        }
    }

    #[test]
    fn long_runs_or_many_values_select_barc() {
        assert_eq!(infer_breaks(&[0, 1, 2, 3, 4, 5]), BreakSelection::Barc);
        assert_eq!(infer_breaks(&[0, 10, 20, 30, 40, 50, 60, 70]), BreakSelection::Barc);
        assert_ne!(infer_breaks(&[0, 1, 2, 3, 4]), BreakSelection::Barc);
    }

    #[test]
    fn run_length_counts_from_minimum() {
        assert_eq!(consecutive_run_from_min(&[2, 3, 4, 9]), 3);
        assert_eq!(consecutive_run_from_min(&[7]), 1);
        assert_eq!(consecutive_run_from_min(&[]), 0);
    }
}
