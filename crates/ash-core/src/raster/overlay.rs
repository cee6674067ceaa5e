//! Per-subcatchment aggregation of an overlay raster.
//!
//! Both functions require the overlay to share the subcatchment grid; call
//! [`super::reproject_nearest`] first when it does not. Pixels whose
//! subcatchment id is 0 lie outside the watershed and are skipped.

use std::collections::{BTreeMap, HashMap};

use super::Raster;
use crate::error::{AshError, Result};

/// Mode reported for a subcatchment whose pixels are all nodata.
pub const UNKNOWN_MODE: i32 = 255;

fn check_grid<T, U>(overlay: &Raster<T>, subcatchments: &Raster<U>) -> Result<()> {
    if overlay.width != subcatchments.width || overlay.height != subcatchments.height {
        return Err(AshError::InvalidArgument(format!(
            "overlay is {}×{} but subcatchment grid is {}×{}; reproject the overlay first",
            overlay.width, overlay.height, subcatchments.width, subcatchments.height
        )));
    }
    Ok(())
}

/// Integer mode of `overlay` within each subcatchment id.
///
/// Values listed in `nodata` do not vote. Ties go to the smallest value.
/// A subcatchment with no valid pixel maps to [`UNKNOWN_MODE`].
pub fn mode_over_subcatchments(
    overlay: &Raster<i32>,
    subcatchments: &Raster<i32>,
    nodata: &[i32],
) -> Result<BTreeMap<i32, i32>> {
    check_grid(overlay, subcatchments)?;

    let mut counts: HashMap<i32, BTreeMap<i32, usize>> = HashMap::new();
    for (&id, &value) in subcatchments.data.iter().zip(overlay.data.iter()) {
        if id == 0 {
            continue;
        }
        let hist = counts.entry(id).or_default();
        if !nodata.contains(&value) {
            *hist.entry(value).or_insert(0) += 1;
        }
    }

    Ok(counts
        .into_iter()
        .map(|(id, hist)| {
            let mut best = UNKNOWN_MODE;
            let mut best_n = 0usize;
            // BTreeMap iterates ascending, so strict `>` keeps the smallest on ties.
            for (value, n) in hist {
                if n > best_n {
                    best = value;
                    best_n = n;
                }
            }
            (id, best)
        })
        .collect())
}

/// Arithmetic mean of `overlay` within each subcatchment id.
///
/// NaN pixels and pixels equal to `nodata` are skipped; a subcatchment with
/// no valid pixel maps to NaN.
pub fn mean_over_subcatchments(
    overlay: &Raster<f64>,
    subcatchments: &Raster<i32>,
    nodata: Option<f64>,
) -> Result<BTreeMap<i32, f64>> {
    check_grid(overlay, subcatchments)?;

    let mut sums: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for (&id, &value) in subcatchments.data.iter().zip(overlay.data.iter()) {
        if id == 0 {
            continue;
        }
        let acc = sums.entry(id).or_insert((0.0, 0));
        if value.is_nan() || nodata.is_some_and(|nd| value == nd) {
            continue;
        }
        acc.0 += value;
        acc.1 += 1;
    }

    Ok(sums
        .into_iter()
        .map(|(id, (sum, n))| (id, if n == 0 { f64::NAN } else { sum / n as f64 }))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subs() -> Raster<i32> {
        // 4×3: ids 0 (outside), 22, 23, 31
        Raster::from_vec(
            vec![
                0, 22, 22, 22, //
                23, 23, 22, 31, //
                23, 23, 31, 31,
            ],
            4,
            3,
        )
        .unwrap()
    }

    #[test]
    fn mode_picks_majority_and_skips_outside() {
        let overlay = Raster::from_vec(
            vec![
                133, 132, 132, 131, //
                131, 131, 133, 255, //
                131, 130, 255, 255,
            ],
            4,
            3,
        )
        .unwrap();
        let modes = mode_over_subcatchments(&overlay, &subs(), &[255]).unwrap();
        assert_eq!(modes.get(&0), None);
        assert_eq!(modes[&22], 132);
        assert_eq!(modes[&23], 131);
        // 31 is all nodata.
        assert_eq!(modes[&31], UNKNOWN_MODE);
    }

    #[test]
    fn mode_ties_break_to_smallest() {
        let overlay = Raster::from_vec(
            vec![
                0, 133, 131, 131, //
                130, 132, 133, 1, //
                132, 130, 2, 1,
            ],
            4,
            3,
        )
        .unwrap();
        let modes = mode_over_subcatchments(&overlay, &subs(), &[]).unwrap();
        // 22: {133:2, 131:2} → 131
        assert_eq!(modes[&22], 131);
        // 23: {130:2, 132:2} → 130
        assert_eq!(modes[&23], 130);
        // 31: {1:2, 2:1}
        assert_eq!(modes[&31], 1);
    }

    #[test]
    fn mean_skips_nodata_and_reports_nan() {
        let overlay = Raster::from_vec(
            vec![
                9.0, 10.0, 20.0, f64::NAN, //
                1.0, 3.0, 30.0, -9999.0, //
                5.0, 7.0, -9999.0, -9999.0,
            ],
            4,
            3,
        )
        .unwrap();
        let means = mean_over_subcatchments(&overlay, &subs(), Some(-9999.0)).unwrap();
        assert!((means[&22] - 20.0).abs() < 1e-12);
        assert!((means[&23] - 4.0).abs() < 1e-12);
        assert!(means[&31].is_nan());
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        let overlay = Raster::new(2, 2, 0i32);
        assert!(mode_over_subcatchments(&overlay, &subs(), &[]).is_err());
    }
}
