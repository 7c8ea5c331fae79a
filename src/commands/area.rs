use anyhow::{Result, bail};
use tracing::info;

use crate::cli::AreaArgs;
use crate::grid::{dimension_for_target_points, grid_from_bounds, grid_from_radius};
use crate::model::{Bounds, Coordinate, GridPoint, SearchArea};

pub(crate) const DEFAULT_GRID_DIMENSION: usize = 13;

#[derive(Debug, Clone)]
pub(crate) struct ResolvedGrid {
    pub(crate) center: Coordinate,
    pub(crate) area: SearchArea,
    pub(crate) dimension: usize,
    pub(crate) points: Vec<GridPoint>,
}

pub(crate) fn resolve_grid(args: &AreaArgs) -> Result<ResolvedGrid> {
    let requested_dimension = args
        .dimension
        .or(args.target_points.map(dimension_for_target_points));

    let resolved = match &args.bounds {
        Some(values) => {
            let bounds = parse_bounds(values)?;
            let (dimension, points) = grid_from_bounds(bounds, requested_dimension)?;
            ResolvedGrid {
                center: bounds.center(),
                area: SearchArea::Bounds { bounds },
                dimension,
                points,
            }
        }
        None => {
            let (Some(lat), Some(lng)) = (args.lat, args.lng) else {
                bail!("either --bounds or both --lat and --lng are required");
            };
            let center = Coordinate { lat, lng };
            let dimension = requested_dimension.unwrap_or(DEFAULT_GRID_DIMENSION);
            let points = grid_from_radius(center, args.radius_miles, dimension)?;
            ResolvedGrid {
                center,
                area: SearchArea::Radius {
                    center,
                    radius_miles: args.radius_miles,
                },
                dimension,
                points,
            }
        }
    };

    info!(
        dimension = resolved.dimension,
        points = resolved.points.len(),
        center_lat = resolved.center.lat,
        center_lng = resolved.center.lng,
        "generated grid"
    );
    Ok(resolved)
}

fn parse_bounds(values: &[f64]) -> Result<Bounds> {
    let [south, west, north, east] = values else {
        bail!(
            "--bounds expects south,west,north,east (4 values), got {}",
            values.len()
        );
    };
    Ok(Bounds {
        southwest: Coordinate {
            lat: *south,
            lng: *west,
        },
        northeast: Coordinate {
            lat: *north,
            lng: *east,
        },
    })
}
