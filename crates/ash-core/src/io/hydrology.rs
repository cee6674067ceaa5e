//! Hillslope hydrology readers.
//!
//! WEPP water balance files (`H{n}.wat.dat`) carry one row per OFE per day
//! keyed by simulation year `Y` and Julian day `J`. Multi-OFE hillslopes are
//! reduced to one row per day: depth variables are area-weighted and runoff
//! is taken from the last OFE, which drains the hillslope.

use std::collections::HashMap;
use std::path::Path;

use crate::ash::frame::{from_julian, julian_day, HydrologyDay};
use crate::error::{AshError, Result};

/// Columns of a water balance row, in file order.
pub const WAT_COLUMNS: [&str; 20] = [
    "OFE",
    "J",
    "Y",
    "P",
    "RM",
    "Q",
    "Ep",
    "Es",
    "Er",
    "Dp",
    "UpStrmQ",
    "SubRIn",
    "latqcc",
    "Total-Soil Water",
    "frozwt",
    "Snow-Water",
    "QOFE",
    "Tile",
    "Irr",
    "Area",
];

/// One OFE-day before reduction.
#[derive(Debug, Clone, PartialEq)]
struct OfeRow {
    ofe: u32,
    year: i32,
    julian: u32,
    month: u32,
    day: u32,
    area: f64,
    precip_mm: f64,
    rainmelt_mm: f64,
    runoff_mm: f64,
    soil_water_mm: f64,
    snow_water_mm: f64,
    peak_ro: Option<f64>,
    eff_duration: Option<f64>,
}

fn parse_f64(token: &str, source: &str, line: usize) -> Result<f64> {
    token.parse::<f64>().map_err(|_| AshError::Parse {
        source_name: source.to_string(),
        line,
        detail: format!("`{token}` is not a number"),
    })
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse a WEPP water balance file. `first_year` is the calendar year of
/// simulation year 1.
pub fn parse_wat_dat(text: &str, first_year: i32, source: &str) -> Result<Vec<HydrologyDay>> {
    let mut rows = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        // Header and separator lines do not start with an integer OFE index.
        let Some(first) = tokens.first() else { continue };
        if first.parse::<u32>().is_err() {
            continue;
        }
        if tokens.len() < WAT_COLUMNS.len() {
            return Err(AshError::Parse {
                source_name: source.to_string(),
                line: line_no,
                detail: format!("expected {} columns, found {}", WAT_COLUMNS.len(), tokens.len()),
            });
        }
        let values = tokens[..WAT_COLUMNS.len()]
            .iter()
            .map(|t| parse_f64(t, source, line_no))
            .collect::<Result<Vec<f64>>>()?;

        let year = first_year + values[2] as i32 - 1;
        let julian = values[1] as u32;
        let (month, day) = from_julian(year, julian).ok_or_else(|| AshError::Parse {
            source_name: source.to_string(),
            line: line_no,
            detail: format!("julian day {julian} invalid for year {year}"),
        })?;
        rows.push(OfeRow {
            ofe: values[0] as u32,
            year,
            julian,
            month,
            day,
            precip_mm: values[3],
            rainmelt_mm: values[4],
            runoff_mm: values[5],
            soil_water_mm: values[13],
            snow_water_mm: values[15],
            area: values[19],
            peak_ro: None,
            eff_duration: None,
        });
    }
    if rows.is_empty() {
        return Err(AshError::Parse {
            source_name: source.to_string(),
            line: 0,
            detail: "no water balance rows".to_string(),
        });
    }
    Ok(reduce_ofes(rows))
}

pub fn read_wat_dat(path: &Path, first_year: i32) -> Result<Vec<HydrologyDay>> {
    if !path.exists() {
        return Err(AshError::MissingInput(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    parse_wat_dat(&text, first_year, &source_name(path))
}

/// Column lookup over a CSV header, with alternative spellings.
struct Columns<'a> {
    headers: &'a csv::StringRecord,
    frame: &'static str,
}

impl Columns<'_> {
    fn find(&self, names: &[&str]) -> Option<usize> {
        self.headers.iter().position(|h| {
            let h = h.trim();
            names.iter().any(|n| h.eq_ignore_ascii_case(n))
        })
    }

    fn require(&self, names: &[&str]) -> Result<usize> {
        self.find(names).ok_or_else(|| AshError::MissingColumn {
            frame: self.frame,
            column: names[0].to_string(),
        })
    }
}

fn field(record: &csv::StringRecord, idx: usize, source: &str, line: usize) -> Result<f64> {
    parse_f64(record.get(idx).unwrap_or("").trim(), source, line)
}

fn optional_field(record: &csv::StringRecord, idx: Option<usize>, source: &str, line: usize) -> Result<Option<f64>> {
    match idx.and_then(|i| record.get(i)).map(str::trim) {
        None | Some("") => Ok(None),
        Some(t) => parse_f64(t, source, line).map(Some),
    }
}

/// Parse a daily hydrology CSV. Required columns: `year`, `month`,
/// `day_of_month`, `P`, `RM`, `Q`, `Total-Soil Water`, `Snow-Water`.
/// `julian`, `OFE`, `Area`, `peak_ro`, `eff_duration` are optional.
pub fn parse_hydrology_csv<R: std::io::Read>(reader: R, source: &str) -> Result<Vec<HydrologyDay>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let cols = Columns {
        headers: &headers,
        frame: "hydrology",
    };
    let year_i = cols.require(&["year"])?;
    let month_i = cols.require(&["month", "mo"])?;
    let day_i = cols.require(&["day_of_month", "day", "da"])?;
    let julian_i = cols.find(&["julian", "J"]);
    let p_i = cols.require(&["P", "P (mm)"])?;
    let rm_i = cols.require(&["RM", "RM (mm)"])?;
    let q_i = cols.require(&["Q", "Q (mm)"])?;
    let tsw_i = cols.require(&["Total-Soil Water", "Total-Soil Water (mm)"])?;
    let swe_i = cols.require(&["Snow-Water", "Snow-Water (mm)"])?;
    let ofe_i = cols.find(&["OFE"]);
    let area_i = cols.find(&["Area", "Area (m^2)"]);
    let peak_i = cols.find(&["peak_ro", "peak_ro (m^3/s)"]);
    let dur_i = cols.find(&["eff_duration", "eff_duration (hr)"]);

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let line = idx + 2;
        let year = field(&record, year_i, source, line)? as i32;
        let month = field(&record, month_i, source, line)? as u32;
        let day = field(&record, day_i, source, line)? as u32;
        let julian = match julian_i {
            Some(i) => field(&record, i, source, line)? as u32,
            None => julian_day(year, month, day).ok_or_else(|| AshError::Parse {
                source_name: source.to_string(),
                line,
                detail: format!("invalid date {year}-{month}-{day}"),
            })?,
        };
        rows.push(OfeRow {
            ofe: match ofe_i {
                Some(i) => field(&record, i, source, line)? as u32,
                None => 1,
            },
            year,
            julian,
            month,
            day,
            area: match area_i {
                Some(i) => field(&record, i, source, line)?,
                None => 1.0,
            },
            precip_mm: field(&record, p_i, source, line)?,
            rainmelt_mm: field(&record, rm_i, source, line)?,
            runoff_mm: field(&record, q_i, source, line)?,
            soil_water_mm: field(&record, tsw_i, source, line)?,
            snow_water_mm: field(&record, swe_i, source, line)?,
            peak_ro: optional_field(&record, peak_i, source, line)?,
            eff_duration: optional_field(&record, dur_i, source, line)?,
        });
    }
    Ok(reduce_ofes(rows))
}

pub fn read_hydrology_csv(path: &Path) -> Result<Vec<HydrologyDay>> {
    if !path.exists() {
        return Err(AshError::MissingInput(path.to_path_buf()));
    }
    let file = std::fs::File::open(path)?;
    parse_hydrology_csv(file, &source_name(path))
}

/// One row per `(year, julian)`, first-seen order.
fn reduce_ofes(rows: Vec<OfeRow>) -> Vec<HydrologyDay> {
    let mut order: Vec<(i32, u32)> = Vec::new();
    let mut groups: HashMap<(i32, u32), Vec<OfeRow>> = HashMap::new();
    for row in rows {
        let key = (row.year, row.julian);
        groups
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(row);
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .filter_map(|group| {
            let outlet = group.iter().max_by_key(|r| r.ofe)?.clone();
            if group.len() == 1 {
                return Some(to_day(&outlet, outlet.precip_mm, outlet.rainmelt_mm, outlet.soil_water_mm, outlet.snow_water_mm));
            }
            let total_area: f64 = group.iter().map(|r| r.area).sum();
            let weighted = |f: fn(&OfeRow) -> f64| -> f64 {
                if total_area > 0.0 {
                    group.iter().map(|r| f(r) * r.area).sum::<f64>() / total_area
                } else {
                    group.iter().map(f).sum::<f64>() / group.len() as f64
                }
            };
            Some(to_day(
                &outlet,
                weighted(|r| r.precip_mm),
                weighted(|r| r.rainmelt_mm),
                weighted(|r| r.soil_water_mm),
                weighted(|r| r.snow_water_mm),
            ))
        })
        .collect()
}

fn to_day(outlet: &OfeRow, precip_mm: f64, rainmelt_mm: f64, soil_water_mm: f64, snow_water_mm: f64) -> HydrologyDay {
    HydrologyDay {
        year: outlet.year,
        month: outlet.month,
        day: outlet.day,
        julian: outlet.julian,
        precip_mm,
        rainmelt_mm,
        runoff_mm: outlet.runoff_mm,
        soil_water_mm,
        snow_water_mm,
        peak_ro: outlet.peak_ro,
        eff_duration: outlet.eff_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const WAT: &str = "\
  WATER BALANCE DAILY OUTPUT
 OFE  J    Y     P      RM     Q      Ep     Es     Er      Dp    UpStrmQ  SubRIn latqcc Total-Soil frozwt Snow-Water  QOFE    Tile    Irr    Area
 ---  ---  ---  -----  -----  -----  -----  -----  -----  -----  -----  -----  -----  -----  -----  -----  -----  -----  -----  -----
   1    1    1   0.00   0.00   0.00   0.10   0.20   0.00   0.00   0.00   0.00   0.00  120.0   0.00   0.00   0.00   0.00   0.00  1000.0
   2    1    1   0.00   0.00   0.00   0.10   0.20   0.00   0.00   0.00   0.00   0.00  100.0   0.00   0.00   0.00   0.00   0.00  3000.0
   1    2    1  12.00  10.00   1.00   0.10   0.20   0.00   0.00   0.00   0.00   0.00  130.0   0.00   0.00   0.00   0.00   0.00  1000.0
   2    2    1  12.00  14.00   3.00   0.10   0.20   0.00   0.00   0.00   0.00   0.00  110.0   0.00   0.00   0.00   0.00   0.00  3000.0
   1    1    2   5.00   5.00   0.00   0.10   0.20   0.00   0.00   0.00   0.00   0.00  120.0   0.00   2.00   0.00   0.00   0.00  1000.0
   2    1    2   5.00   5.00   0.00   0.10   0.20   0.00   0.00   0.00   0.00   0.00  100.0   0.00   6.00   0.00   0.00   0.00  3000.0
";

    #[test]
    fn wat_dat_reduces_ofes() {
        let days = parse_wat_dat(WAT, 1990, "H1.wat.dat").unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!((days[0].year, days[0].month, days[0].day), (1990, 1, 1));
        assert_relative_eq!(days[0].soil_water_mm, 105.0);
        assert_relative_eq!(days[1].rainmelt_mm, 13.0);
        assert_eq!(days[1].runoff_mm, 3.0, "runoff comes from the last OFE");
        assert_eq!(days[2].year, 1991);
        assert_relative_eq!(days[2].snow_water_mm, 5.0);
    }

    #[test]
    fn wat_dat_short_row_is_parse_error() {
        let err = parse_wat_dat("  1 1 1 0.0 0.0\n", 2000, "bad.wat.dat").unwrap_err();
        assert!(matches!(err, AshError::Parse { line: 1, .. }));
    }

    #[test]
    fn missing_file_is_missing_input() {
        let err = read_wat_dat(Path::new("/definitely/not/H9.wat.dat"), 2000).unwrap_err();
        assert!(matches!(err, AshError::MissingInput(_)));
    }

    #[test]
    fn csv_hydrology_with_element_columns() {
        let text = "year,month,day_of_month,julian,P,RM,Q,Total-Soil Water,Snow-Water,peak_ro (m^3/s),eff_duration (hr)\n\
                    2001,1,1,1,3.0,2.0,0.5,100,0,0.02,1.5\n\
                    2001,1,2,2,0.0,0.0,0.0,99,0,,\n";
        let days = parse_hydrology_csv(text.as_bytes(), "h.csv").unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].peak_ro, Some(0.02));
        assert_eq!(days[1].eff_duration, None);
        assert_eq!(days[1].julian, 2);
    }

    #[test]
    fn csv_hydrology_missing_column() {
        let text = "year,month,day_of_month,P,RM,Total-Soil Water,Snow-Water\n2001,1,1,0,0,0,0\n";
        match parse_hydrology_csv(text.as_bytes(), "h.csv").unwrap_err() {
            AshError::MissingColumn { frame, column } => {
                assert_eq!(frame, "hydrology");
                assert_eq!(column, "Q");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
