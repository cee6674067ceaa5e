//! Nearest-neighbour resampling onto another raster's grid.
//!
//! Only resampling between grids in the same CRS is supported; class codes
//! are copied, never blended.

use super::Raster;
use crate::error::{AshError, Result};

/// Resample `src` onto the grid of `template`.
///
/// Destination pixels whose centre falls outside `src` receive `fill`.
/// The result carries `src`'s palette and nodata tag. Fails with
/// [`AshError::ProjectionMismatch`] when both rasters declare different CRSs.
pub fn reproject_nearest<T: Copy, U>(src: &Raster<T>, template: &Raster<U>, fill: T) -> Result<Raster<T>> {
    if !src.projection.is_compatible(&template.projection) {
        return Err(AshError::ProjectionMismatch {
            src: src.projection.to_string(),
            dst: template.projection.to_string(),
        });
    }

    let mut out = Raster::new(template.width, template.height, fill)
        .with_georef(template.transform, template.projection);
    out.nodata = src.nodata;
    out.color_table = src.color_table.clone();

    if src.same_grid(template) {
        out.data.copy_from_slice(&src.data);
        return Ok(out);
    }

    for r in 0..template.height {
        for c in 0..template.width {
            let (x, y) = template.transform.pixel_center(r, c);
            let (fr, fc) = src.transform.world_to_pixel(x, y);
            if fr < 0.0 || fc < 0.0 {
                continue;
            }
            let (sr, sc) = (fr.floor() as usize, fc.floor() as usize);
            if sr < src.height && sc < src.width {
                out.set(r, c, src.get(sr, sc));
            }
        }
    }
    Ok(out)
}
