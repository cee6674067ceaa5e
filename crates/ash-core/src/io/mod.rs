//! File formats: WEPP/CSV hydrology, CLIGEN/CSV climate, the parquet daily
//! series, and atomic writes for everything the run produces.

pub mod atomic;
pub mod climate;
pub mod hydrology;
pub mod series;

pub use atomic::{write_atomic, write_csv_atomic, write_csv_to, write_json_atomic, write_json_to};
pub use climate::{parse_cli, parse_climate_csv, read_climate};
pub use hydrology::{parse_hydrology_csv, parse_wat_dat, read_hydrology_csv, read_wat_dat};
pub use series::{read_ash_parquet, write_ash_parquet, write_ash_parquet_to};
