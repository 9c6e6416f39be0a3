//! Sector grid geometry.
//!
//! The inhabited region is a cube 2000ly on a side centred on the origin,
//! cut into 100ly sectors. A coordinate maps to the nearest sector centre per
//! axis, which gives 21 sectors per axis (-10..=10).

use crate::types::SectorCoord;

pub const INHABITED_RANGE_LY: f64 = 2000.0;
pub const SECTOR_SIZE_LY: f64 = 100.0;
/// Largest sector index on any axis; the grid spans `-SECTOR_MAX..=SECTOR_MAX`.
pub const SECTOR_MAX: i32 = (INHABITED_RANGE_LY / SECTOR_SIZE_LY) as i32 / 2;

fn axis_sector(coord: f64) -> Option<i32> {
    if !coord.is_finite() {
        return None;
    }
    let sector = (coord / SECTOR_SIZE_LY).round();
    if sector.abs() > SECTOR_MAX as f64 {
        return None;
    }
    Some(sector as i32)
}

/// Sector holding `(x, y, z)`, or `None` when the point lies outside the
/// inhabited range or is not a finite coordinate.
pub fn sector_of(x: f64, y: f64, z: f64) -> Option<SectorCoord> {
    Some(SectorCoord::new(
        axis_sector(x)?,
        axis_sector(y)?,
        axis_sector(z)?,
    ))
}

pub fn in_range(x: f64, y: f64, z: f64) -> bool {
    sector_of(x, y, z).is_some()
}

/// Cells exactly `radius` steps (Chebyshev distance) from `origin`: the outer
/// skin of the `(2r+1)^3` cube. Radius 0 yields the origin alone.
pub fn shell(origin: SectorCoord, radius: i32) -> impl Iterator<Item = SectorCoord> {
    let r = radius.max(0);
    (-r..=r).flat_map(move |dx| {
        (-r..=r).flat_map(move |dy| {
            (-r..=r).filter_map(move |dz| {
                let on_skin = dx.abs() == r || dy.abs() == r || dz.abs() == r;
                on_skin.then(|| origin.offset(dx, dy, dz))
            })
        })
    })
}
