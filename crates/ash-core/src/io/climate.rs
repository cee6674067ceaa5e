//! Daily climate readers: CLIGEN `.cli` files and plain CSV.

use std::path::Path;

use crate::ash::frame::ClimateDay;
use crate::error::{AshError, Result};

fn parse_error(source: &str, line: usize, detail: impl Into<String>) -> AshError {
    AshError::Parse {
        source_name: source.to_string(),
        line,
        detail: detail.into(),
    }
}

/// Parse a CLIGEN daily climate file.
///
/// The observation table starts after the header line naming `da mo year`
/// and `w-vl`; the units line under it is skipped because it does not start
/// with a number.
pub fn parse_cli(text: &str, source: &str) -> Result<Vec<ClimateDay>> {
    let mut lines = text.lines().enumerate();
    let header = lines
        .by_ref()
        .map(|(_, l)| l.split_whitespace().collect::<Vec<_>>())
        .find(|t| t.len() >= 4 && t[0] == "da" && t[1] == "mo" && t[2] == "year");
    let Some(header) = header else {
        return Err(AshError::MissingColumn {
            frame: "climate",
            column: "da mo year".to_string(),
        });
    };
    let wind_i = header
        .iter()
        .position(|&c| c == "w-vl")
        .ok_or_else(|| AshError::MissingColumn {
            frame: "climate",
            column: "w-vl".to_string(),
        })?;

    let mut days = Vec::new();
    for (idx, raw) in lines {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        let Some(first) = tokens.first() else { continue };
        if first.parse::<u32>().is_err() {
            continue;
        }
        if tokens.len() <= wind_i {
            return Err(parse_error(source, idx + 1, format!("row has {} columns, w-vl is column {}", tokens.len(), wind_i + 1)));
        }
        let int = |i: usize| {
            tokens[i]
                .parse::<i64>()
                .map_err(|_| parse_error(source, idx + 1, format!("`{}` is not an integer", tokens[i])))
        };
        let peak_wind = tokens[wind_i]
            .parse::<f64>()
            .map_err(|_| parse_error(source, idx + 1, format!("`{}` is not a number", tokens[wind_i])))?;
        days.push(ClimateDay {
            day: int(0)? as u32,
            month: int(1)? as u32,
            year: int(2)? as i32,
            peak_wind,
        });
    }
    if days.is_empty() {
        return Err(parse_error(source, 0, "no daily observations"));
    }
    Ok(days)
}

/// Parse a climate CSV with `year`, `mo`/`month`, `da`/`day` and `w-vl`.
pub fn parse_climate_csv<R: std::io::Read>(reader: R, source: &str) -> Result<Vec<ClimateDay>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let find = |names: &[&str]| -> Result<usize> {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
            .ok_or_else(|| AshError::MissingColumn {
                frame: "climate",
                column: names[0].to_string(),
            })
    };
    let year_i = find(&["year"])?;
    let month_i = find(&["mo", "month"])?;
    let day_i = find(&["da", "day"])?;
    let wind_i = find(&["w-vl", "w-vl (m/s)"])?;

    let mut days = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let line = idx + 2;
        let num = |i: usize| -> Result<f64> {
            let t = record.get(i).unwrap_or("");
            t.parse::<f64>()
                .map_err(|_| parse_error(source, line, format!("`{t}` is not a number")))
        };
        days.push(ClimateDay {
            year: num(year_i)? as i32,
            month: num(month_i)? as u32,
            day: num(day_i)? as u32,
            peak_wind: num(wind_i)?,
        });
    }
    Ok(days)
}

/// Read `.cli` or `.csv` by extension.
pub fn read_climate(path: &Path) -> Result<Vec<ClimateDay>> {
    if !path.exists() {
        return Err(AshError::MissingInput(path.to_path_buf()));
    }
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let is_csv = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        parse_climate_csv(std::fs::File::open(path)?, &source)
    } else {
        parse_cli(&std::fs::read_to_string(path)?, &source)
    }
}
