use anyhow::{Result, bail};
use serde::Serialize;

use crate::model::{Bounds, Coordinate, GridPoint};
use crate::util::round_to;

pub const MILES_PER_DEGREE_LAT: f64 = 69.0;
pub const MAX_GRID_DIMENSION: usize = 25;

const COORDINATE_DECIMALS: i32 = 6;
const SMALL_AREA_DIMENSION: usize = 11;
const MEDIUM_AREA_DIMENSION: usize = 13;
const LARGE_AREA_DIMENSION: usize = 15;
const MEDIUM_AREA_MILES: f64 = 10.0;
const LARGE_AREA_MILES: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegreeSteps {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridSummary {
    pub total_points: usize,
    pub spacing_miles: f64,
    pub coverage_area_sq_miles: f64,
}

pub fn miles_per_degree_lng(center_lat: f64) -> f64 {
    MILES_PER_DEGREE_LAT * center_lat.to_radians().cos()
}

pub fn validate_center(center: Coordinate) -> Result<()> {
    if !center.lat.is_finite() || !(-90.0..=90.0).contains(&center.lat) {
        bail!("latitude out of range [-90, 90]: {}", center.lat);
    }
    if !center.lng.is_finite() || !(-180.0..=180.0).contains(&center.lng) {
        bail!("longitude out of range [-180, 180]: {}", center.lng);
    }
    Ok(())
}

pub fn validate_dimension(dimension: usize) -> Result<()> {
    if dimension == 0 || dimension > MAX_GRID_DIMENSION {
        bail!("grid dimension must be within 1..={MAX_GRID_DIMENSION}, got {dimension}");
    }
    Ok(())
}

fn validate_radius(radius_miles: f64) -> Result<()> {
    if !radius_miles.is_finite() || radius_miles <= 0.0 {
        bail!("radius must be a positive number of miles, got {radius_miles}");
    }
    Ok(())
}

pub fn degree_steps(center_lat: f64, radius_miles: f64, dimension: usize) -> Result<DegreeSteps> {
    validate_radius(radius_miles)?;
    validate_dimension(dimension)?;
    if center_lat.abs() >= 90.0 {
        bail!("radius grids are undefined at the poles (latitude {center_lat})");
    }

    let span_miles = radius_miles * 2.0 / dimension as f64;
    Ok(DegreeSteps {
        lat: span_miles / MILES_PER_DEGREE_LAT,
        lng: span_miles / miles_per_degree_lng(center_lat),
    })
}

pub fn grid_from_radius(
    center: Coordinate,
    radius_miles: f64,
    dimension: usize,
) -> Result<Vec<GridPoint>> {
    validate_center(center)?;
    let steps = degree_steps(center.lat, radius_miles, dimension)?;

    let lat_reach = radius_miles / MILES_PER_DEGREE_LAT;
    let start_lat = center.lat - lat_reach;
    if start_lat < -90.0 || center.lat + lat_reach > 90.0 {
        bail!(
            "radius of {radius_miles} miles around latitude {} crosses a pole",
            center.lat
        );
    }
    let start_lng = center.lng - radius_miles / miles_per_degree_lng(center.lat);

    Ok(lattice(dimension, |row, col| {
        (
            start_lat + row as f64 * steps.lat,
            wrap_longitude(start_lng + col as f64 * steps.lng),
        )
    }))
}

// Radius grids may straddle the antimeridian; the lattice keeps its shape and
// only the reported longitude is folded back into range.
pub fn wrap_longitude(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }
}

pub fn grid_from_bounds(
    bounds: Bounds,
    dimension: Option<usize>,
) -> Result<(usize, Vec<GridPoint>)> {
    validate_bounds(bounds)?;

    let dimension = match dimension {
        Some(value) => value,
        None => {
            let (height, width) = bounds_extent_miles(bounds);
            dimension_for_extent(height, width)
        }
    };
    validate_dimension(dimension)?;

    let sw = bounds.southwest;
    let ne = bounds.northeast;
    let points = if dimension == 1 {
        let mid = bounds.center();
        lattice(1, |_, _| (mid.lat, mid.lng))
    } else {
        let steps = (dimension - 1) as f64;
        let lat_step = (ne.lat - sw.lat) / steps;
        let lng_step = (ne.lng - sw.lng) / steps;
        lattice(dimension, |row, col| {
            (
                sw.lat + row as f64 * lat_step,
                sw.lng + col as f64 * lng_step,
            )
        })
    };

    Ok((dimension, points))
}

fn validate_bounds(bounds: Bounds) -> Result<()> {
    validate_center(bounds.southwest)?;
    validate_center(bounds.northeast)?;
    if bounds.northeast.lat <= bounds.southwest.lat {
        bail!(
            "bounds northeast latitude {} must exceed southwest latitude {}",
            bounds.northeast.lat,
            bounds.southwest.lat
        );
    }
    // Viewports crossing the antimeridian are not supported.
    if bounds.northeast.lng <= bounds.southwest.lng {
        bail!(
            "bounds northeast longitude {} must exceed southwest longitude {}",
            bounds.northeast.lng,
            bounds.southwest.lng
        );
    }
    Ok(())
}

fn lattice(dimension: usize, position: impl Fn(usize, usize) -> (f64, f64)) -> Vec<GridPoint> {
    let mut points = Vec::with_capacity(dimension * dimension);
    for row in 0..dimension {
        for col in 0..dimension {
            let (lat, lng) = position(row, col);
            points.push(GridPoint {
                lat: round_to(lat, COORDINATE_DECIMALS),
                lng: round_to(lng, COORDINATE_DECIMALS),
                row,
                col,
                index: row * dimension + col,
            });
        }
    }
    points
}

pub fn bounds_extent_miles(bounds: Bounds) -> (f64, f64) {
    let center = bounds.center();
    let height = (bounds.northeast.lat - bounds.southwest.lat) * MILES_PER_DEGREE_LAT;
    let width = (bounds.northeast.lng - bounds.southwest.lng) * miles_per_degree_lng(center.lat);
    (height, width)
}

pub fn dimension_for_extent(height_miles: f64, width_miles: f64) -> usize {
    if height_miles > LARGE_AREA_MILES || width_miles > LARGE_AREA_MILES {
        LARGE_AREA_DIMENSION
    } else if height_miles > MEDIUM_AREA_MILES || width_miles > MEDIUM_AREA_MILES {
        MEDIUM_AREA_DIMENSION
    } else {
        SMALL_AREA_DIMENSION
    }
}

pub fn dimension_for_target_points(target_points: usize) -> usize {
    [SMALL_AREA_DIMENSION, MEDIUM_AREA_DIMENSION]
        .into_iter()
        .find(|dimension| dimension * dimension >= target_points)
        .unwrap_or(LARGE_AREA_DIMENSION)
}

pub fn summarize(radius_miles: f64, dimension: usize) -> GridSummary {
    let span = radius_miles * 2.0;
    GridSummary {
        total_points: dimension * dimension,
        spacing_miles: round_to(span / dimension.max(1) as f64, 2),
        coverage_area_sq_miles: round_to(span * span, 0),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn ashburn() -> Coordinate {
        Coordinate {
            lat: 39.0438,
            lng: -77.4874,
        }
    }

    #[test]
    fn radius_grid_matches_ashburn_scenario() {
        let points = grid_from_radius(ashburn(), 5.0, 13).expect("grid should generate");
        assert_eq!(points.len(), 169);

        assert_eq!(points[0].index, 0);
        assert_eq!((points[0].row, points[0].col), (0, 0));
        assert_eq!(points[168].index, 168);
        assert_eq!((points[168].row, points[168].col), (12, 12));

        let expected_start_lat = round_to(39.0438 - 5.0 / 69.0, 6);
        assert_eq!(points[0].lat, expected_start_lat);
        assert!(points[0].lng < -77.4874);
    }

    #[test]
    fn radius_grid_indices_are_contiguous_and_cells_unique() {
        for dimension in [1_usize, 2, 7, 15] {
            let points = grid_from_radius(ashburn(), 3.5, dimension).expect("grid should generate");
            assert_eq!(points.len(), dimension * dimension);

            let cells = points
                .iter()
                .map(|point| (point.row, point.col))
                .collect::<HashSet<_>>();
            assert_eq!(cells.len(), dimension * dimension);

            for (position, point) in points.iter().enumerate() {
                assert_eq!(point.index, position);
                assert_eq!(point.index, point.row * dimension + point.col);
            }
        }
    }

    #[test]
    fn radius_grid_is_deterministic() {
        let first = grid_from_radius(ashburn(), 5.0, 13).expect("grid should generate");
        let second = grid_from_radius(ashburn(), 5.0, 13).expect("grid should generate");
        assert_eq!(first, second);
    }

    #[test]
    fn longitude_degree_length_halves_at_sixty_degrees() {
        let equator = miles_per_degree_lng(0.0);
        let sixty = miles_per_degree_lng(60.0);
        assert!((sixty - equator / 2.0).abs() < 1e-9, "sixty={sixty}");

        let steps_equator = degree_steps(0.0, 5.0, 13).expect("steps should compute");
        let steps_sixty = degree_steps(60.0, 5.0, 13).expect("steps should compute");
        assert!((steps_sixty.lng - steps_equator.lng * 2.0).abs() < 1e-9);
        assert_eq!(steps_sixty.lat, steps_equator.lat);

        let ground_equator = steps_equator.lng * equator;
        let ground_sixty = steps_sixty.lng * sixty;
        assert!((ground_equator - ground_sixty).abs() < 1e-9);
    }

    #[test]
    fn invalid_inputs_are_rejected_before_generation() {
        let bad_lat = Coordinate {
            lat: 91.0,
            lng: 0.0,
        };
        let error = grid_from_radius(bad_lat, 5.0, 13).expect_err("latitude should be rejected");
        assert!(error.to_string().contains("latitude out of range"), "{error}");

        let bad_lng = Coordinate {
            lat: 0.0,
            lng: -181.0,
        };
        assert!(grid_from_radius(bad_lng, 5.0, 13).is_err());

        let error = grid_from_radius(ashburn(), 0.0, 13).expect_err("radius should be rejected");
        assert!(error.to_string().contains("radius"), "{error}");
        assert!(grid_from_radius(ashburn(), -2.0, 13).is_err());
        assert!(grid_from_radius(ashburn(), f64::NAN, 13).is_err());
        assert!(grid_from_radius(ashburn(), 5.0, 0).is_err());
        assert!(grid_from_radius(ashburn(), 5.0, MAX_GRID_DIMENSION + 1).is_err());

        let pole = Coordinate {
            lat: 90.0,
            lng: 0.0,
        };
        assert!(grid_from_radius(pole, 5.0, 3).is_err());
    }

    #[test]
    fn grids_reaching_past_a_pole_are_rejected() {
        let near_north = Coordinate {
            lat: 89.99,
            lng: 0.0,
        };
        let error = grid_from_radius(near_north, 5.0, 5).expect_err("pole crossing rejected");
        assert!(error.to_string().contains("crosses a pole"), "{error}");

        let near_south = Coordinate {
            lat: -89.95,
            lng: 120.0,
        };
        assert!(grid_from_radius(near_south, 5.0, 5).is_err());

        let close_but_clear = Coordinate {
            lat: 89.9,
            lng: 0.0,
        };
        let points = grid_from_radius(close_but_clear, 5.0, 5).expect("grid should generate");
        assert!(points.iter().all(|point| point.lat <= 90.0));
    }

    #[test]
    fn longitudes_wrap_across_the_antimeridian() {
        let fiji = Coordinate {
            lat: 10.0,
            lng: 179.99,
        };
        let points = grid_from_radius(fiji, 5.0, 5).expect("grid should generate");
        assert_eq!(points.len(), 25);
        assert!(
            points
                .iter()
                .all(|point| (-180.0..=180.0).contains(&point.lng)),
            "{points:?}"
        );

        let first_row = &points[..5];
        assert!(first_row[0].lng > 179.0);
        assert!(first_row[4].lng < -179.0);

        assert_eq!(wrap_longitude(-77.5), -77.5);
        assert_eq!(wrap_longitude(180.0), 180.0);
        assert!((wrap_longitude(180.5) + 179.5).abs() < 1e-9);
        assert!((wrap_longitude(-181.0) - 179.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_grid_interpolates_corners() {
        let bounds = Bounds {
            southwest: Coordinate {
                lat: 39.0,
                lng: -77.6,
            },
            northeast: Coordinate {
                lat: 39.1,
                lng: -77.4,
            },
        };

        let (dimension, points) = grid_from_bounds(bounds, Some(5)).expect("grid should generate");
        assert_eq!(dimension, 5);
        assert_eq!(points.len(), 25);
        assert_eq!((points[0].lat, points[0].lng), (39.0, -77.6));
        assert_eq!((points[24].lat, points[24].lng), (39.1, -77.4));
        assert_eq!((points[12].lat, points[12].lng), (39.05, -77.5));
    }

    #[test]
    fn bounds_grid_derives_dimension_from_extent() {
        let small = Bounds {
            southwest: Coordinate { lat: 39.0, lng: -77.5 },
            northeast: Coordinate { lat: 39.05, lng: -77.45 },
        };
        let (dimension, points) = grid_from_bounds(small, None).expect("grid should generate");
        assert_eq!(dimension, 11);
        assert_eq!(points.len(), 121);

        let large = Bounds {
            southwest: Coordinate { lat: 39.0, lng: -77.9 },
            northeast: Coordinate { lat: 39.4, lng: -77.4 },
        };
        let (dimension, _) = grid_from_bounds(large, None).expect("grid should generate");
        assert_eq!(dimension, 15);
    }

    #[test]
    fn bounds_grid_rejects_inverted_corners() {
        let inverted = Bounds {
            southwest: Coordinate { lat: 39.1, lng: -77.4 },
            northeast: Coordinate { lat: 39.0, lng: -77.6 },
        };
        let error = grid_from_bounds(inverted, Some(3)).expect_err("inverted bounds rejected");
        assert!(error.to_string().contains("northeast latitude"), "{error}");
    }

    #[test]
    fn single_cell_bounds_grid_uses_midpoint() {
        let bounds = Bounds {
            southwest: Coordinate { lat: 10.0, lng: 20.0 },
            northeast: Coordinate { lat: 12.0, lng: 24.0 },
        };
        let (_, points) = grid_from_bounds(bounds, Some(1)).expect("grid should generate");
        assert_eq!(points.len(), 1);
        assert_eq!((points[0].lat, points[0].lng), (11.0, 22.0));
    }

    #[test]
    fn city_size_heuristics_pick_expected_dimensions() {
        assert_eq!(dimension_for_extent(5.0, 8.0), 11);
        assert_eq!(dimension_for_extent(12.0, 4.0), 13);
        assert_eq!(dimension_for_extent(9.0, 25.0), 15);

        assert_eq!(dimension_for_target_points(100), 11);
        assert_eq!(dimension_for_target_points(121), 11);
        assert_eq!(dimension_for_target_points(169), 13);
        assert_eq!(dimension_for_target_points(200), 15);
        assert_eq!(dimension_for_target_points(10_000), 15);
    }

    #[test]
    fn summary_reports_spacing_and_area() {
        let summary = summarize(5.0, 10);
        assert_eq!(summary.total_points, 100);
        assert_eq!(summary.spacing_miles, 1.0);
        assert_eq!(summary.coverage_area_sq_miles, 100.0);
    }
}
