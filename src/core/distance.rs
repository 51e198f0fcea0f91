//! Distance measures relative to a fixed reference position

/// Great-circle angle from a reference position, in radians (spherical law of cosines)
#[derive(Debug, Clone, Copy)]
pub struct CosineDistance {
    lon: f64,
    si: f64,
    co: f64,
}

impl CosineDistance {
    pub fn new(lon: f64, lat: f64) -> Self {
        let (si, co) = lat.to_radians().sin_cos();
        Self { lon, si, co }
    }

    pub fn distance(&self, lon: f64, lat: f64) -> f64 {
        let (sin_phi, cos_phi) = lat.to_radians().sin_cos();
        let cos_angle = self.si * sin_phi + self.co * cos_phi * (lon - self.lon).to_radians().cos();
        cos_angle.clamp(-1.0, 1.0).acos()
    }
}

/// Squared planar distance in degrees² on a sinusoidal projection centered at the
/// reference position. Only meaningful for small separations.
#[derive(Debug, Clone, Copy)]
pub struct SinusoidalDistance {
    lon: f64,
    lat: f64,
}

impl SinusoidalDistance {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn distance(&self, lon: f64, lat: f64) -> f64 {
        let mut delta_lon = lon - self.lon;
        if delta_lon > 180.0 {
            delta_lon -= 360.0;
        } else if delta_lon < -180.0 {
            delta_lon += 360.0;
        }
        let dx = delta_lon * lat.to_radians().cos();
        let dy = lat - self.lat;
        dx * dx + dy * dy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_cosine_distance() {
        let measure = CosineDistance::new(0.0, 0.0);
        assert_abs_diff_eq!(measure.distance(0.0, 0.0), 0.0, epsilon = 1e-7);
        assert_abs_diff_eq!(measure.distance(90.0, 0.0), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(measure.distance(0.0, -90.0), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(measure.distance(180.0, 0.0), std::f64::consts::PI, epsilon = 1e-12);

        // symmetric across the antimeridian
        let measure = CosineDistance::new(179.5, 0.0);
        assert_abs_diff_eq!(measure.distance(-179.5, 0.0), 1.0_f64.to_radians(), epsilon = 1e-7);
    }

    #[test]
    fn test_sinusoidal_distance_wraps() {
        let measure = SinusoidalDistance::new(179.9, 0.0);
        assert_abs_diff_eq!(measure.distance(-179.9, 0.0), 0.04, epsilon = 1e-9);
        assert_abs_diff_eq!(measure.distance(179.9, 0.3), 0.09, epsilon = 1e-9);

        // meridians converge away from the equator
        let measure = SinusoidalDistance::new(10.0, 60.0);
        assert_abs_diff_eq!(measure.distance(11.0, 60.0), 0.25, epsilon = 1e-9);
    }
}
