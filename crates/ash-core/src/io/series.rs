//! Parquet codec for the per-hillslope daily ash series.
//!
//! Column names carry their units so the files are self-describing.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::atomic::write_atomic;
use crate::ash::simulate::AshDay;
use crate::error::{AshError, Result};

struct IntColumn {
    name: &'static str,
    get: fn(&AshDay) -> i32,
    set: fn(&mut AshDay, i32),
}

struct FloatColumn {
    name: &'static str,
    get: fn(&AshDay) -> f64,
    set: fn(&mut AshDay, f64),
}

struct OptionalColumn {
    name: &'static str,
    get: fn(&AshDay) -> Option<f64>,
    set: fn(&mut AshDay, Option<f64>),
}

const INT_COLUMNS: &[IntColumn] = &[
    IntColumn { name: "fire_year", get: |d| d.fire_year, set: |d, v| d.fire_year = v },
    IntColumn { name: "days_from_fire", get: |d| d.days_from_fire as i32, set: |d, v| d.days_from_fire = v as u32 },
    IntColumn { name: "year", get: |d| d.year, set: |d, v| d.year = v },
    IntColumn { name: "mo", get: |d| d.month as i32, set: |d, v| d.month = v as u32 },
    IntColumn { name: "da", get: |d| d.day as i32, set: |d, v| d.day = v as u32 },
    IntColumn { name: "julian", get: |d| d.julian as i32, set: |d, v| d.julian = v as u32 },
];

macro_rules! float_columns {
    ($($name:literal => $field:ident),* $(,)?) => {
        const FLOAT_COLUMNS: &[FloatColumn] = &[
            $(FloatColumn { name: $name, get: |d| d.$field, set: |d, v| d.$field = v },)*
        ];
    };
}

float_columns! {
    "precip (mm)" => precip_mm,
    "rainmelt (mm)" => rainmelt_mm,
    "runoff (mm)" => runoff_mm,
    "Total-Soil Water (mm)" => soil_water_mm,
    "Snow-Water (mm)" => snow_water_mm,
    "infil (mm)" => infil_mm,
    "cum_infil (mm)" => cum_infil_mm,
    "w-vl (m/s)" => peak_wind,
    "max_wind (m/s)" => max_wind,
    "bulk_density (gm/cm3)" => bulk_density,
    "porosity" => porosity,
    "ash_depth (mm)" => ash_depth_mm,
    "remaining_ash (tonne/ha)" => remaining_ash,
    "transportable_ash (tonne/ha)" => transportable_ash,
    "ash_runoff (mm)" => ash_runoff_mm,
    "cum_ash_runoff (mm)" => cum_ash_runoff_mm,
    "transport_rate (tonne/ha/mm)" => transport_rate,
    "water_transport (tonne/ha)" => water_transport,
    "wind_transport (tonne/ha)" => wind_transport,
    "ash_transport (tonne/ha)" => ash_transport,
    "ash_decomp (tonne/ha)" => ash_decomp,
    "cum_water_transport (tonne/ha)" => cum_water_transport,
    "cum_wind_transport (tonne/ha)" => cum_wind_transport,
    "cum_ash_transport (tonne/ha)" => cum_ash_transport,
    "cum_ash_decomp (tonne/ha)" => cum_ash_decomp,
}

const OPTIONAL_COLUMNS: &[OptionalColumn] = &[
    OptionalColumn { name: "peak_ro (m^3/s)", get: |d| d.peak_ro, set: |d, v| d.peak_ro = v },
    OptionalColumn { name: "eff_duration (hr)", get: |d| d.eff_duration, set: |d, v| d.eff_duration = v },
];

/// Frame name used in missing-column errors.
const FRAME: &str = "ash";

pub fn ash_schema() -> Schema {
    let fields: Vec<Field> = INT_COLUMNS
        .iter()
        .map(|c| Field::new(c.name, DataType::Int32, false))
        .chain(FLOAT_COLUMNS.iter().map(|c| Field::new(c.name, DataType::Float64, false)))
        .chain(OPTIONAL_COLUMNS.iter().map(|c| Field::new(c.name, DataType::Float64, true)))
        .collect();
    Schema::new(fields)
}

pub fn to_record_batch(days: &[AshDay]) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(INT_COLUMNS.len() + FLOAT_COLUMNS.len() + OPTIONAL_COLUMNS.len());
    for c in INT_COLUMNS {
        columns.push(Arc::new(Int32Array::from_iter_values(days.iter().map(c.get))));
    }
    for c in FLOAT_COLUMNS {
        columns.push(Arc::new(Float64Array::from_iter_values(days.iter().map(c.get))));
    }
    for c in OPTIONAL_COLUMNS {
        columns.push(Arc::new(Float64Array::from(days.iter().map(c.get).collect::<Vec<_>>())));
    }
    Ok(RecordBatch::try_new(Arc::new(ash_schema()), columns)?)
}

/// Encode the series into an open file, Snappy compressed.
pub fn write_ash_parquet_to(file: &mut File, days: &[AshDay]) -> Result<()> {
    let batch = to_record_batch(days)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

pub fn write_ash_parquet(path: &Path, days: &[AshDay]) -> Result<()> {
    write_atomic(path, |file| write_ash_parquet_to(file, days))
}

fn column<'b, A: Array + 'static>(batch: &'b RecordBatch, name: &str) -> Result<&'b A> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AshError::MissingColumn {
            frame: FRAME,
            column: name.to_string(),
        })?
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| AshError::InvalidArgument(format!("column `{name}` has unexpected type")))
}

pub fn from_record_batch(batch: &RecordBatch) -> Result<Vec<AshDay>> {
    let mut days = vec![AshDay::default(); batch.num_rows()];
    for c in INT_COLUMNS {
        let arr = column::<Int32Array>(batch, c.name)?;
        for (d, v) in days.iter_mut().zip(arr.values().iter()) {
            (c.set)(d, *v);
        }
    }
    for c in FLOAT_COLUMNS {
        let arr = column::<Float64Array>(batch, c.name)?;
        for (d, v) in days.iter_mut().zip(arr.values().iter()) {
            (c.set)(d, *v);
        }
    }
    for c in OPTIONAL_COLUMNS {
        // Older files may predate the element columns.
        let Some(arr) = batch.column_by_name(c.name) else { continue };
        let arr = arr
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| AshError::InvalidArgument(format!("column `{}` has unexpected type", c.name)))?;
        for (d, v) in days.iter_mut().zip(arr.iter()) {
            (c.set)(d, v);
        }
    }
    Ok(days)
}

pub fn read_ash_parquet(path: &Path) -> Result<Vec<AshDay>> {
    if !path.exists() {
        return Err(AshError::MissingInput(path.to_path_buf()));
    }
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;
    let mut days = Vec::new();
    for batch in reader {
        days.extend(from_record_batch(&batch?)?);
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: u32) -> AshDay {
        AshDay {
            fire_year: 2001,
            days_from_fire: i,
            year: 2001,
            month: 8,
            day: 1 + i,
            julian: 213 + i,
            remaining_ash: 10.0 - i as f64,
            water_transport: i as f64 * 0.5,
            peak_ro: if i % 2 == 0 { Some(0.1) } else { None },
            ..AshDay::default()
        }
    }

    #[test]
    fn column_names_carry_units() {
        let schema = ash_schema();
        assert!(schema.field_with_name("remaining_ash (tonne/ha)").is_ok());
        assert!(schema.field_with_name("w-vl (m/s)").is_ok());
        let names: std::collections::HashSet<_> = schema.fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names.len(), schema.fields().len(), "column names must be unique");
    }

    #[test]
    fn parquet_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("H1_ash.parquet");
        let days: Vec<AshDay> = (0..5).map(sample).collect();
        write_ash_parquet(&path, &days).unwrap();
        let back = read_ash_parquet(&path).unwrap();
        assert_eq!(back, days);
    }

    #[test]
    fn missing_required_column_reported() {
        let schema = Arc::new(Schema::new(vec![Field::new("fire_year", DataType::Int32, false)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![2001])) as ArrayRef]).unwrap();
        let err = from_record_batch(&batch).unwrap_err();
        assert!(matches!(err, AshError::MissingColumn { frame: "ash", .. }));
    }
}
