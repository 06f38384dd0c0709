//! Working projections. Only what the pipeline needs is supported: WGS84 to
//! a spherical Lambert Azimuthal Equal-Area projection and back, and
//! pass-through for data already in the working projected CRS.

use crate::domain::model::Crs;
use geo::{coord, Coord, Rect};
use thiserror::Error;

/// Radius of the sphere with the same surface area as the WGS84 ellipsoid.
pub const AUTHALIC_RADIUS_M: f64 = 6_371_007.181;

const BOUNDS_SAMPLES_PER_EDGE: usize = 16;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("cannot reproject from {from} into {to}")]
    Unsupported { from: Crs, to: String },

    #[error("coordinate ({x}, {y}) is outside the valid range of {crs}")]
    OutOfRange { x: f64, y: f64, crs: Crs },

    #[error("coordinate ({x}, {y}) is antipodal to the projection centre")]
    Antipodal { x: f64, y: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Inputs are already in this projected CRS.
    Native { epsg: u32 },
    /// Spherical LAEA on the authalic sphere, centred on `(lon0, lat0)` degrees.
    LambertAzimuthalEqualArea { lon0: f64, lat0: f64 },
}

impl Projection {
    pub fn laea(lon0: f64, lat0: f64) -> Self {
        Projection::LambertAzimuthalEqualArea { lon0, lat0 }
    }

    pub fn label(&self) -> String {
        match self {
            Projection::Native { epsg } => Crs::Projected(*epsg).to_string(),
            Projection::LambertAzimuthalEqualArea { lon0, lat0 } => format!(
                "+proj=laea +lat_0={} +lon_0={} +R={} +units=m",
                lat0, lon0, AUTHALIC_RADIUS_M
            ),
        }
    }

    /// Maps a coordinate declared in `from` into the working CRS.
    pub fn project(&self, from: Crs, c: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        match (*self, from) {
            (Projection::Native { epsg }, Crs::Projected(code)) if code == epsg => Ok(c),
            (Projection::LambertAzimuthalEqualArea { lon0, lat0 }, Crs::Wgs84) => {
                laea_forward(lon0, lat0, c)
            }
            _ => Err(ProjectionError::Unsupported {
                from,
                to: self.label(),
            }),
        }
    }

    /// Maps a working-CRS coordinate back into `to`.
    pub fn unproject(&self, to: Crs, c: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        match (*self, to) {
            (Projection::Native { epsg }, Crs::Projected(code)) if code == epsg => Ok(c),
            (Projection::LambertAzimuthalEqualArea { lon0, lat0 }, Crs::Wgs84) => {
                laea_inverse(lon0, lat0, c)
            }
            _ => Err(ProjectionError::Unsupported {
                from: to,
                to: self.label(),
            }),
        }
    }

    /// Bounding box in `to` of a working-CRS rectangle. Edges are sampled
    /// because straight lines in one system bend in the other.
    pub fn bounds_in(&self, to: Crs, rect: Rect<f64>) -> Result<Rect<f64>, ProjectionError> {
        if let Projection::Native { .. } = self {
            self.unproject(to, rect.min())?;
            return Ok(rect);
        }

        let (min, max) = (rect.min(), rect.max());
        let mut lo = coord! { x: f64::INFINITY, y: f64::INFINITY };
        let mut hi = coord! { x: f64::NEG_INFINITY, y: f64::NEG_INFINITY };

        for i in 0..=BOUNDS_SAMPLES_PER_EDGE {
            let t = i as f64 / BOUNDS_SAMPLES_PER_EDGE as f64;
            let x = min.x + (max.x - min.x) * t;
            let y = min.y + (max.y - min.y) * t;
            for sample in [
                coord! { x: x, y: min.y },
                coord! { x: x, y: max.y },
                coord! { x: min.x, y: y },
                coord! { x: max.x, y: y },
            ] {
                let p = self.unproject(to, sample)?;
                lo = coord! { x: lo.x.min(p.x), y: lo.y.min(p.y) };
                hi = coord! { x: hi.x.max(p.x), y: hi.y.max(p.y) };
            }
        }

        Ok(Rect::new(lo, hi))
    }
}

fn check_geographic(c: Coord<f64>) -> Result<(), ProjectionError> {
    if !(-180.0..=180.0).contains(&c.x) || !(-90.0..=90.0).contains(&c.y) {
        return Err(ProjectionError::OutOfRange {
            x: c.x,
            y: c.y,
            crs: Crs::Wgs84,
        });
    }
    Ok(())
}

fn laea_forward(lon0: f64, lat0: f64, c: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
    check_geographic(c)?;

    let (sin_phi1, cos_phi1) = lat0.to_radians().sin_cos();
    let (sin_phi, cos_phi) = c.y.to_radians().sin_cos();
    let (sin_dl, cos_dl) = (c.x - lon0).to_radians().sin_cos();

    let denom = 1.0 + sin_phi1 * sin_phi + cos_phi1 * cos_phi * cos_dl;
    if denom <= 1e-12 {
        return Err(ProjectionError::Antipodal { x: c.x, y: c.y });
    }
    let k = (2.0 / denom).sqrt();

    Ok(coord! {
        x: AUTHALIC_RADIUS_M * k * cos_phi * sin_dl,
        y: AUTHALIC_RADIUS_M * k * (cos_phi1 * sin_phi - sin_phi1 * cos_phi * cos_dl),
    })
}

fn laea_inverse(lon0: f64, lat0: f64, c: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
    let rho = c.x.hypot(c.y);
    if rho < 1e-9 {
        return Ok(coord! { x: lon0, y: lat0 });
    }
    if !rho.is_finite() || rho > 2.0 * AUTHALIC_RADIUS_M {
        return Err(ProjectionError::OutOfRange {
            x: c.x,
            y: c.y,
            crs: Crs::Wgs84,
        });
    }

    let (sin_phi1, cos_phi1) = lat0.to_radians().sin_cos();
    let cap_c = 2.0 * (rho / (2.0 * AUTHALIC_RADIUS_M)).asin();
    let (sin_c, cos_c) = cap_c.sin_cos();

    let phi = (cos_c * sin_phi1 + c.y * sin_c * cos_phi1 / rho)
        .clamp(-1.0, 1.0)
        .asin();
    let lambda = lon0.to_radians()
        + (c.x * sin_c).atan2(rho * cos_phi1 * cos_c - c.y * sin_phi1 * sin_c);

    let mut lon = lambda.to_degrees();
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon < -180.0 {
        lon += 360.0;
    }

    Ok(coord! { x: lon, y: phi.to_degrees() })
}
