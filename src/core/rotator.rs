use crate::types::SamplePoint;

/// Rigid rotation of the sphere mapping a chosen center point onto (lon=0, lat=0).
///
/// Local fits are done in the rotated frame, away from the poles and the
/// antimeridian, so longitude wrap and meridian convergence do not distort them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotator {
    a11: f64,
    a12: f64,
    a13: f64,
    a21: f64,
    a22: f64,
    a23: f64,
    a31: f64,
    a32: f64,
    a33: f64,
}

impl Rotator {
    /// Rotation moving (`lon`, `lat`) to the origin, no roll
    pub fn new(lon: f64, lat: f64) -> Self {
        Self::with_roll(lon, lat, 0.0)
    }

    /// Rotation moving (`lon`, `lat`) to the origin, then rolling by `alpha` degrees
    /// about the new x axis.
    pub fn with_roll(lon: f64, lat: f64, alpha: f64) -> Self {
        let (su, cu) = lon.to_radians().sin_cos();
        let (sv, cv) = lat.to_radians().sin_cos();
        let (sw, cw) = alpha.to_radians().sin_cos();

        Self {
            a11: cu * cv,
            a12: su * cv,
            a13: sv,
            a21: sw * (cu * sv) - su * cw,
            a22: cw * cu + sw * (su * sv),
            a23: -sw * cv,
            a31: sw * -su - cw * (cu * sv),
            a32: sw * cu - cw * (su * sv),
            a33: cw * cv,
        }
    }

    /// Rotate a single (lon, lat) pair, degrees in and out
    pub fn transform(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y, z) = to_cartesian(lon, lat);
        let x2 = self.a11 * x + self.a12 * y + self.a13 * z;
        let y2 = self.a21 * x + self.a22 * y + self.a23 * z;
        let z2 = self.a31 * x + self.a32 * y + self.a33 * z;
        to_lon_lat(x2, y2, z2)
    }

    /// Undo [`Rotator::transform`] (the matrix is orthonormal, so the transpose inverts it)
    pub fn transform_inversely(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y, z) = to_cartesian(lon, lat);
        let x2 = self.a11 * x + self.a21 * y + self.a31 * z;
        let y2 = self.a12 * x + self.a22 * y + self.a32 * z;
        let z2 = self.a13 * x + self.a23 * y + self.a33 * z;
        to_lon_lat(x2, y2, z2)
    }

    /// Rotate parallel longitude/latitude slices in place
    pub fn transform_all(&self, lons: &mut [f64], lats: &mut [f64]) {
        for (lon, lat) in lons.iter_mut().zip(lats.iter_mut()) {
            let (rotated_lon, rotated_lat) = self.transform(*lon, *lat);
            *lon = rotated_lon;
            *lat = rotated_lat;
        }
    }

    /// Inverse of [`Rotator::transform_all`]
    pub fn transform_all_inversely(&self, lons: &mut [f64], lats: &mut [f64]) {
        for (lon, lat) in lons.iter_mut().zip(lats.iter_mut()) {
            let (original_lon, original_lat) = self.transform_inversely(*lon, *lat);
            *lon = original_lon;
            *lat = original_lat;
        }
    }

    /// Rotate the geodetic part of each sample point in place; pixel coordinates are untouched
    pub fn transform_points(&self, points: &mut [SamplePoint]) {
        for point in points.iter_mut() {
            let (lon, lat) = self.transform(point.lon, point.lat);
            point.lon = lon;
            point.lat = lat;
        }
    }
}

/// Center of a set of sample points on the sphere: the normalized sum of their unit vectors.
///
/// Working in Cartesian space keeps the center well defined across the antimeridian
/// and near the poles. Returns `(lon, lat)` in degrees, or `None` for an empty set or
/// for points that cancel out.
pub fn calculate_center(points: &[SamplePoint]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }

    let (mut xc, mut yc, mut zc) = (0.0, 0.0, 0.0);
    for point in points {
        let (x, y, z) = to_cartesian(point.lon, point.lat);
        xc += x;
        yc += y;
        zc += z;
    }

    let length = (xc * xc + yc * yc + zc * zc).sqrt();
    if length == 0.0 || !length.is_finite() {
        return None;
    }

    Some(to_lon_lat(xc / length, yc / length, zc / length))
}

fn to_cartesian(lon: f64, lat: f64) -> (f64, f64, f64) {
    let (su, cu) = lon.to_radians().sin_cos();
    let (sv, cv) = lat.to_radians().sin_cos();
    (cu * cv, su * cv, sv)
}

fn to_lon_lat(x: f64, y: f64, z: f64) -> (f64, f64) {
    let lat = z.atan2((x * x + y * y).sqrt()).to_degrees();
    let lon = y.atan2(x).to_degrees();
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_center_maps_to_origin() {
        for &(lon, lat) in &[(0.0, 0.0), (10.0, 50.0), (-179.5, -33.0), (120.0, 89.0)] {
            let rotator = Rotator::new(lon, lat);
            let (u, v) = rotator.transform(lon, lat);
            assert_abs_diff_eq!(u, 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_round_trip() {
        let rotator = Rotator::with_roll(-65.0, 72.5, 15.0);
        for i in 0..36 {
            for j in 0..17 {
                let lon = -175.0 + 10.0 * i as f64;
                let lat = -80.0 + 10.0 * j as f64;
                let (u, v) = rotator.transform(lon, lat);
                let (lon2, lat2) = rotator.transform_inversely(u, v);
                assert_abs_diff_eq!(lon2, lon, epsilon = 1e-9);
                assert_abs_diff_eq!(lat2, lat, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_batch_matches_single() {
        let rotator = Rotator::new(179.0, -10.0);
        let mut lons = vec![178.0, -179.0, 179.5];
        let mut lats = vec![-11.0, -9.0, -10.2];
        let expected: Vec<(f64, f64)> = lons
            .iter()
            .zip(&lats)
            .map(|(&lon, &lat)| rotator.transform(lon, lat))
            .collect();

        rotator.transform_all(&mut lons, &mut lats);
        for (i, (lon, lat)) in expected.iter().enumerate() {
            assert_abs_diff_eq!(lons[i], *lon, epsilon = 1e-12);
            assert_abs_diff_eq!(lats[i], *lat, epsilon = 1e-12);
        }

        // points straddling the antimeridian end up close to the origin
        assert!(lons.iter().all(|lon| lon.abs() < 2.0));

        rotator.transform_all_inversely(&mut lons, &mut lats);
        assert_abs_diff_eq!(lons[1], -179.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lats[2], -10.2, epsilon = 1e-9);
    }

    #[test]
    fn test_calculate_center_across_antimeridian() {
        let points = [
            SamplePoint { lat: 10.0, lon: 179.0, x: 0.5, y: 0.5 },
            SamplePoint { lat: 10.0, lon: -179.0, x: 1.5, y: 0.5 },
        ];
        let (lon, lat) = calculate_center(&points).unwrap();
        assert_abs_diff_eq!(lon.abs(), 180.0, epsilon = 1e-9);
        assert!(lat > 10.0 && lat < 10.01);

        assert!(calculate_center(&[]).is_none());
    }
}
