use crate::core::distance::CosineDistance;
use crate::core::rational::{find_best_model, RationalFunctionModel};
use crate::core::rotator::{calculate_center, Rotator};
use crate::types::{PixelPos, Rectangle, SamplePoint};
use serde::{Deserialize, Serialize};

/// Accuracy goal for the inverse (pixel → geo) models, in rotated degrees
pub const INVERSE_ACCURACY: f64 = 0.01;

/// Safety margin applied to the largest center distance of a tile's samples
const MAX_DISTANCE_INFLATION: f64 = 1.1;

/// How the inverse models lon(x, y) and lat(x, y) are handled when building a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InverseModels {
    /// Forward models only; pixel → geo queries are not answered
    Skip,
    /// A tile whose inverse models cannot be fitted fails like a forward failure
    Required,
}

/// Local approximation of the pixel ↔ geo mapping over one tile
#[derive(Debug, Clone)]
pub struct Approximation {
    fx: RationalFunctionModel,
    fy: RationalFunctionModel,
    flon: Option<RationalFunctionModel>,
    flat: Option<RationalFunctionModel>,
    center_lon: f64,
    center_lat: f64,
    distance: CosineDistance,
    max_distance: f64,
    rotator: Rotator,
    range: Rectangle,
}

impl Approximation {
    /// Build the approximation for one tile from its sample points.
    ///
    /// `accuracy` is the RMSE goal of the forward models in pixels, `inverse_accuracy`
    /// the goal of the inverse models in degrees. Returns `None` when the forward
    /// models (or, with [`InverseModels::Required`], the inverse models) cannot be fitted.
    pub fn create(
        points: &[SamplePoint],
        accuracy: f64,
        inverse_accuracy: f64,
        inverse: InverseModels,
        range: Rectangle,
    ) -> Option<Self> {
        let (center_lon, center_lat) = calculate_center(points)?;
        let max_distance = max_distance(points, center_lon, center_lat);

        let rotator = Rotator::new(center_lon, center_lat);
        let mut rotated = points.to_vec();
        rotator.transform_points(&mut rotated);

        let lats: Vec<f64> = rotated.iter().map(|p| p.lat).collect();
        let lons: Vec<f64> = rotated.iter().map(|p| p.lon).collect();
        let xs: Vec<f64> = rotated.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = rotated.iter().map(|p| p.y).collect();

        let fx = find_best_model(&lats, &lons, &xs, accuracy)?;
        let fy = find_best_model(&lats, &lons, &ys, accuracy)?;

        let (flon, flat) = match inverse {
            InverseModels::Skip => (None, None),
            InverseModels::Required => (
                Some(find_best_model(&xs, &ys, &lons, inverse_accuracy)?),
                Some(find_best_model(&xs, &ys, &lats, inverse_accuracy)?),
            ),
        };

        log::debug!(
            "Tile {:?}: {} points, center=({:.4}, {:.4}), fx P{}Q{} rmse={:.2e}, fy P{}Q{} rmse={:.2e}, inverse={}",
            range,
            points.len(),
            center_lat,
            center_lon,
            fx.degree_p(),
            fx.degree_q(),
            fx.rmse(),
            fy.degree_p(),
            fy.degree_q(),
            fy.rmse(),
            flon.is_some()
        );

        Some(Self {
            fx,
            fy,
            flon,
            flat,
            center_lon,
            center_lat,
            distance: CosineDistance::new(center_lon, center_lat),
            max_distance: max_distance * MAX_DISTANCE_INFLATION,
            rotator,
            range,
        })
    }

    /// Great-circle angle (radians) from the tile center to (lat, lon)
    pub fn distance(&self, lat: f64, lon: f64) -> f64 {
        self.distance.distance(lon, lat)
    }

    /// Validity radius in radians
    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center_lon, self.center_lat)
    }

    pub fn rotator(&self) -> &Rotator {
        &self.rotator
    }

    pub fn range(&self) -> &Rectangle {
        &self.range
    }

    /// Forward model x(lat', lon') in the rotated frame
    pub fn fx(&self) -> &RationalFunctionModel {
        &self.fx
    }

    /// Forward model y(lat', lon') in the rotated frame
    pub fn fy(&self) -> &RationalFunctionModel {
        &self.fy
    }

    /// Inverse model lon'(x, y), when fitted
    pub fn flon(&self) -> Option<&RationalFunctionModel> {
        self.flon.as_ref()
    }

    /// Inverse model lat'(x, y), when fitted
    pub fn flat(&self) -> Option<&RationalFunctionModel> {
        self.flat.as_ref()
    }

    pub fn has_inverse(&self) -> bool {
        self.flon.is_some() && self.flat.is_some()
    }
}

/// Largest great-circle angle from the center to any sample point
fn max_distance(points: &[SamplePoint], center_lon: f64, center_lat: f64) -> f64 {
    let measure = CosineDistance::new(center_lon, center_lat);
    points
        .iter()
        .map(|p| measure.distance(p.lon, p.lat))
        .fold(0.0, f64::max)
}

/// The approximation whose center is closest to (lat, lon) among those whose
/// validity radius covers it.
pub fn find_most_suitable(approximations: &[Approximation], lat: f64, lon: f64) -> Option<&Approximation> {
    if let [approximation] = approximations {
        let distance = approximation.distance(lat, lon);
        return (distance < approximation.max_distance()).then_some(approximation);
    }

    let mut best: Option<&Approximation> = None;
    let mut min_distance = f64::MAX;
    for approximation in approximations {
        let distance = approximation.distance(lat, lon);
        if distance < min_distance && distance < approximation.max_distance() {
            min_distance = distance;
            best = Some(approximation);
        }
    }
    best
}

/// The first approximation whose tile rectangle contains the pixel position
pub fn find_by_pixel<'a>(approximations: &'a [Approximation], pixel_pos: &PixelPos) -> Option<&'a Approximation> {
    approximations
        .iter()
        .find(|approximation| approximation.range().contains(pixel_pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Regular grid over a tile with lon/lat linear in the pixel center coordinates
    fn tile_points(range: Rectangle, lon0: f64, lat0: f64, step: f64) -> Vec<SamplePoint> {
        let mut points = Vec::new();
        for j in range.y..range.y + range.height {
            for i in range.x..range.x + range.width {
                let x = i as f64 + 0.5;
                let y = j as f64 + 0.5;
                points.push(SamplePoint {
                    lat: lat0 - y * step,
                    lon: lon0 + x * step,
                    x,
                    y,
                });
            }
        }
        points
    }

    #[test]
    fn test_create_forward_and_inverse() {
        let range = Rectangle::new(0, 0, 20, 20);
        let points = tile_points(range, 10.0, 50.0, 0.01);
        let approximation =
            Approximation::create(&points, 0.01, INVERSE_ACCURACY, InverseModels::Required, range).unwrap();

        assert!(approximation.has_inverse());
        let (lon, lat) = approximation.rotator().transform(10.105, 49.895);
        assert_abs_diff_eq!(approximation.fx().value(lat, lon), 10.5, epsilon = 0.01);
        assert_abs_diff_eq!(approximation.fy().value(lat, lon), 10.5, epsilon = 0.01);

        // validity radius covers every sample with margin
        let farthest = points
            .iter()
            .map(|p| approximation.distance(p.lat, p.lon))
            .fold(0.0, f64::max);
        assert_abs_diff_eq!(approximation.max_distance(), farthest * 1.1, epsilon = 1e-12);
    }

    #[test]
    fn test_skip_inverse_models() {
        let range = Rectangle::new(0, 0, 10, 10);
        let points = tile_points(range, -20.0, 0.0, 0.1);
        let approximation = Approximation::create(&points, 0.1, INVERSE_ACCURACY, InverseModels::Skip, range).unwrap();

        assert!(!approximation.has_inverse());
        assert!(approximation.flon().is_none());
    }

    #[test]
    fn test_empty_tile_fails() {
        let range = Rectangle::new(0, 0, 10, 10);
        assert!(Approximation::create(&[], 0.1, INVERSE_ACCURACY, InverseModels::Skip, range).is_none());
    }

    #[test]
    fn test_selection_by_geo_position() {
        let left = Rectangle::new(0, 0, 10, 10);
        let right = Rectangle::new(10, 0, 10, 10);
        let approximations: Vec<Approximation> = [left, right]
            .iter()
            .map(|&range| {
                let points = tile_points(range, 0.0, 0.0, 0.1);
                Approximation::create(&points, 0.1, INVERSE_ACCURACY, InverseModels::Skip, range).unwrap()
            })
            .collect();

        let chosen = find_most_suitable(&approximations, -0.5, 0.2).unwrap();
        assert_eq!(*chosen.range(), left);
        let chosen = find_most_suitable(&approximations, -0.5, 1.8).unwrap();
        assert_eq!(*chosen.range(), right);
        assert!(find_most_suitable(&approximations, 40.0, 40.0).is_none());

        // single approximation still honours its validity radius
        assert!(find_most_suitable(&approximations[..1], -0.5, 0.5).is_some());
        assert!(find_most_suitable(&approximations[..1], -0.5, 5.0).is_none());
    }

    #[test]
    fn test_selection_by_pixel_is_exclusive() {
        let ranges = [
            Rectangle::new(0, 0, 8, 6),
            Rectangle::new(8, 0, 8, 6),
            Rectangle::new(0, 6, 8, 6),
            Rectangle::new(8, 6, 8, 6),
        ];
        let approximations: Vec<Approximation> = ranges
            .iter()
            .map(|&range| {
                let points = tile_points(range, 5.0, 5.0, 0.05);
                Approximation::create(&points, 0.1, INVERSE_ACCURACY, InverseModels::Skip, range).unwrap()
            })
            .collect();

        for j in 0..24 {
            for i in 0..32 {
                let pos = PixelPos::new(i as f64 * 0.5 + 0.25, j as f64 * 0.5 + 0.25);
                let containing: Vec<&Rectangle> = ranges.iter().filter(|r| r.contains(&pos)).collect();
                assert_eq!(containing.len(), 1);
                let chosen = find_by_pixel(&approximations, &pos).unwrap();
                assert_eq!(chosen.range(), containing[0]);
            }
        }
        assert!(find_by_pixel(&approximations, &PixelPos::new(16.0, 3.0)).is_none());
    }
}
