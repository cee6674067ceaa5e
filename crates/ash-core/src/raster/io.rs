//! GeoTIFF reading and writing with the pure-Rust `tiff` codec.
//!
//! Georeferencing is carried by three GeoTIFF tags: ModelPixelScale and
//! ModelTiepoint give the north-up transform, the GeoKey directory gives the
//! EPSG code. GDAL's ASCII nodata tag is honoured when present.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::{PhotometricInterpretation, Tag};
use tiff::ColorType;

use super::{ColorTable, GeoTransform, Projection, Raster};
use crate::error::{AshError, Result};

// ── GeoKey ids ───────────────────────────────────────────────────────────────

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

struct Decoded {
    width: usize,
    height: usize,
    samples: DecodingResult,
    transform: GeoTransform,
    projection: Projection,
    nodata: Option<f64>,
    color_table: Option<ColorTable>,
}

fn decode(path: &Path) -> Result<Decoded> {
    if !path.exists() {
        return Err(AshError::MissingInput(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;

    let colortype = decoder.colortype()?;
    if !matches!(colortype, ColorType::Gray(_) | ColorType::Palette(_)) {
        return Err(AshError::InvalidArgument(format!(
            "{}: expected a single-band raster, found {colortype:?}",
            path.display()
        )));
    }

    let color_table = match decoder.find_tag(Tag::ColorMap)? {
        Some(v) => Some(ColorTable::from_tiff_colormap(&v.into_u16_vec()?)),
        None => None,
    };
    let transform = read_transform(&mut decoder)?;
    let projection = read_projection(&mut decoder)?;
    let nodata = match decoder.find_tag(Tag::GdalNodata)? {
        Some(v) => v.into_string()?.trim().trim_end_matches('\0').parse::<f64>().ok(),
        None => None,
    };
    let samples = decoder.read_image()?;

    Ok(Decoded {
        width: width as usize,
        height: height as usize,
        samples,
        transform,
        projection,
        nodata,
        color_table,
    })
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = match decoder.find_tag(Tag::ModelPixelScaleTag)? {
        Some(v) => Some(v.into_f64_vec()?),
        None => None,
    };
    let tie = match decoder.find_tag(Tag::ModelTiepointTag)? {
        Some(v) => Some(v.into_f64_vec()?),
        None => None,
    };
    Ok(match (scale, tie) {
        (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => GeoTransform {
            origin_x: t[3] - t[0] * s[0],
            pixel_width: s[0],
            origin_y: t[4] + t[1] * s[1],
            pixel_height: -s[1],
        },
        _ => GeoTransform::identity(),
    })
}

fn read_projection<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Projection> {
    let keys = match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
        Some(v) => v.into_u16_vec()?,
        None => return Ok(Projection::default()),
    };
    Ok(projection_from_geokeys(&keys))
}

/// Pull the EPSG code out of a GeoKey directory (header of four shorts, then
/// `key, location, count, value` quadruples; only inline values are read).
fn projection_from_geokeys(keys: &[u16]) -> Projection {
    let mut projection = Projection::default();
    for entry in keys.get(4..).unwrap_or(&[]).chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == 0 || value == 32767 {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE => {
                projection.epsg = Some(u32::from(value));
                projection.geographic = false;
            }
            GEOGRAPHIC_TYPE if projection.epsg.is_none() => {
                projection.epsg = Some(u32::from(value));
                projection.geographic = true;
            }
            _ => {}
        }
    }
    projection
}

fn geokeys_for(projection: &Projection) -> Option<Vec<u16>> {
    let code = u16::try_from(projection.epsg?).ok()?;
    let (model, cs_key) = if projection.geographic {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE)
    };
    Some(vec![
        1, 1, 0, 3,
        GT_MODEL_TYPE, 0, 1, model,
        GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
        cs_key, 0, 1, code,
    ])
}

fn write_georef<W: Write + Seek, K: TiffKind, T>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    raster: &Raster<T>,
) -> Result<()> {
    let gt = raster.transform;
    let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
    dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
    if let Some(keys) = geokeys_for(&raster.projection) {
        dir.write_tag(Tag::GeoKeyDirectoryTag, &keys[..])?;
    }
    if let Some(nodata) = raster.nodata {
        dir.write_tag(Tag::GdalNodata, format!("{nodata}").as_str())?;
    }
    Ok(())
}

fn samples_to_i32(samples: DecodingResult, path: &Path) -> Result<Vec<i32>> {
    let narrow = |v: i64| {
        i32::try_from(v).map_err(|_| {
            AshError::InvalidArgument(format!("{}: pixel value {v} exceeds i32", path.display()))
        })
    };
    Ok(match samples {
        DecodingResult::U8(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I32(v) => v,
        DecodingResult::U32(v) => v.into_iter().map(|x| narrow(i64::from(x))).collect::<Result<_>>()?,
        DecodingResult::I64(v) => v.into_iter().map(narrow).collect::<Result<_>>()?,
        DecodingResult::U64(v) => v
            .into_iter()
            .map(|x| narrow(i64::try_from(x).unwrap_or(i64::MAX)))
            .collect::<Result<_>>()?,
        #[allow(unreachable_patterns)]
        _ => {
            return Err(AshError::InvalidArgument(format!(
                "{}: expected an integer-typed raster",
                path.display()
            )))
        }
    })
}

fn samples_to_f64(samples: DecodingResult) -> Vec<f64> {
    match samples {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => Vec::new(),
    }
}

/// Read an integer-typed single-band raster.
///
/// Missing files are reported as [`AshError::MissingInput`]; float rasters
/// are rejected so class codes are never silently truncated.
pub fn read_raster(path: &Path) -> Result<Raster<i32>> {
    let d = decode(path)?;
    let data = samples_to_i32(d.samples, path)?;
    let mut raster = Raster::from_vec(data, d.width, d.height)?.with_georef(d.transform, d.projection);
    raster.nodata = d.nodata;
    raster.color_table = d.color_table;
    Ok(raster)
}

/// Read any single-band raster as f64 (continuous layers such as ash load).
pub fn read_raster_f64(path: &Path) -> Result<Raster<f64>> {
    let d = decode(path)?;
    let data = samples_to_f64(d.samples);
    let mut raster = Raster::from_vec(data, d.width, d.height)?.with_georef(d.transform, d.projection);
    raster.nodata = d.nodata;
    raster.color_table = d.color_table;
    Ok(raster)
}

/// Write an 8-bit raster. An attached color table is stored as a TIFF
/// palette, bit-exact for every 8-bit channel, including the entry for 255.
pub fn write_raster_u8(path: &Path, raster: &Raster<u8>) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let mut image = encoder.new_image::<colortype::Gray8>(raster.width as u32, raster.height as u32)?;
    write_georef(image.encoder(), raster)?;
    if let Some(ct) = &raster.color_table {
        let colormap = ct.to_tiff_colormap();
        image
            .encoder()
            .write_tag(Tag::PhotometricInterpretation, PhotometricInterpretation::RGBPalette.to_u16())?;
        image.encoder().write_tag(Tag::ColorMap, &colormap[..])?;
    }
    image.write_data(&raster.data)?;
    Ok(())
}

/// Write a signed 32-bit raster (subcatchment ids and similar).
pub fn write_raster_i32(path: &Path, raster: &Raster<i32>) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let mut image = encoder.new_image::<colortype::GrayI32>(raster.width as u32, raster.height as u32)?;
    write_georef(image.encoder(), raster)?;
    image.write_data(&raster.data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn georef() -> (GeoTransform, Projection) {
        (
            GeoTransform { origin_x: 600_000.0, pixel_width: 30.0, origin_y: 5_000_000.0, pixel_height: -30.0 },
            Projection::epsg(32611),
        )
    }

    #[test]
    fn u8_palette_roundtrip_preserves_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sbs.tif");
        let (gt, proj) = georef();
        let mut r = Raster::from_vec(vec![0u8, 1, 2, 3, 255, 1], 3, 2).unwrap().with_georef(gt, proj);
        let mut entries = vec![[0u8, 0, 0, 255]; 256];
        entries[0] = [0, 100, 0, 255];
        entries[1] = [127, 255, 212, 255];
        entries[2] = [255, 255, 0, 255];
        entries[3] = [255, 0, 0, 255];
        entries[255] = [255, 255, 255, 255];
        r.color_table = Some(ColorTable { entries: entries.clone() });
        r.nodata = Some(255.0);
        write_raster_u8(&path, &r).unwrap();

        let back = read_raster(&path).unwrap();
        assert_eq!(back.data, vec![0, 1, 2, 3, 255, 1]);
        assert_eq!((back.width, back.height), (3, 2));
        assert_eq!(back.transform, gt);
        assert_eq!(back.projection.epsg, Some(32611));
        assert_eq!(back.nodata, Some(255.0));
        assert_eq!(back.color_table.unwrap().entries, entries);
    }

    #[test]
    fn i32_roundtrip_without_palette() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subwta.tif");
        let (gt, proj) = georef();
        let r = Raster::from_vec(vec![0, 22, 22, 23, 0, 31], 3, 2).unwrap().with_georef(gt, proj);
        write_raster_i32(&path, &r).unwrap();
        let back = read_raster(&path).unwrap();
        assert_eq!(back.data, r.data);
        assert!(back.color_table.is_none());
        let as_f = read_raster_f64(&path).unwrap();
        assert_eq!(as_f.data[1], 22.0);
    }

    #[test]
    fn missing_file_is_missing_input() {
        let err = read_raster(Path::new("/definitely/not/here.tif")).unwrap_err();
        assert!(matches!(err, AshError::MissingInput(_)));
    }

    #[test]
    fn geokeys_roundtrip() {
        let keys = geokeys_for(&Projection::epsg(26911)).unwrap();
        assert_eq!(projection_from_geokeys(&keys), Projection::epsg(26911));
        let geo = geokeys_for(&Projection::epsg(4326)).unwrap();
        assert!(projection_from_geokeys(&geo).geographic);
    }
}
