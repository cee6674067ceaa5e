//! Wind-threshold tables.
//!
//! Peak daily wind speed (m/s) → cumulative fraction of remaining ash that a
//! wind of that strength moves. Both tables are monotone non-decreasing in
//! both columns and start at `(0, 0)`.

use super::params::AshType;

/// `(peak wind m/s, fraction)` rows for black ash.
pub const BLACK_ASH_WIND: &[(f64, f64)] = &[
    (0.0, 0.0),
    (2.0, 0.0),
    (4.0, 0.0),
    (6.0, 0.02),
    (8.0, 0.06),
    (10.0, 0.12),
    (12.0, 0.20),
    (14.0, 0.29),
    (16.0, 0.38),
    (18.0, 0.46),
    (20.0, 0.53),
    (25.0, 0.65),
    (30.0, 0.74),
];

/// `(peak wind m/s, fraction)` rows for white ash. White ash is finer and
/// starts moving at lower speeds.
pub const WHITE_ASH_WIND: &[(f64, f64)] = &[
    (0.0, 0.0),
    (2.0, 0.0),
    (4.0, 0.03),
    (6.0, 0.08),
    (8.0, 0.15),
    (10.0, 0.24),
    (12.0, 0.34),
    (14.0, 0.44),
    (16.0, 0.53),
    (18.0, 0.61),
    (20.0, 0.68),
    (25.0, 0.79),
    (30.0, 0.86),
];

pub fn table(ash_type: AshType) -> &'static [(f64, f64)] {
    match ash_type {
        AshType::Black => BLACK_ASH_WIND,
        AshType::White => WHITE_ASH_WIND,
    }
}

/// Fraction for the first row whose wind speed is `>= wind`; winds beyond
/// the table use its last row. Non-positive winds transport nothing.
pub fn lookup(wind: f64, ash_type: AshType) -> f64 {
    if wind.is_nan() || wind <= 0.0 {
        return 0.0;
    }
    let rows = table(ash_type);
    rows.iter()
        .find(|&&(w, _)| w >= wind)
        .or_else(|| rows.last())
        .map_or(0.0, |&(_, frac)| frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_monotone() {
        for rows in [BLACK_ASH_WIND, WHITE_ASH_WIND] {
            assert_eq!(rows[0], (0.0, 0.0));
            for pair in rows.windows(2) {
                assert!(pair[1].0 > pair[0].0, "wind column must increase: {pair:?}");
                assert!(pair[1].1 >= pair[0].1, "fraction column must not decrease: {pair:?}");
                assert!((0.0..=1.0).contains(&pair[1].1));
            }
        }
    }

    #[test]
    fn zero_wind_moves_nothing() {
        assert_eq!(lookup(0.0, AshType::White), 0.0);
        assert_eq!(lookup(0.0, AshType::Black), 0.0);
        assert_eq!(lookup(f64::NAN, AshType::Black), 0.0);
    }

    #[test]
    fn lookup_uses_first_row_at_or_above() {
        assert_eq!(lookup(10.0, AshType::White), 0.24);
        assert_eq!(lookup(10.5, AshType::White), 0.34);
        assert_eq!(lookup(5.0, AshType::Black), 0.02);
        assert_eq!(lookup(99.0, AshType::Black), 0.74);
    }

    #[test]
    fn lookup_is_monotone_in_wind() {
        let mut prev = 0.0;
        for i in 0..400 {
            let f = lookup(i as f64 * 0.1, AshType::White);
            assert!(f >= prev);
            prev = f;
        }
    }
}
