use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;

use super::area::resolve_grid;
use crate::cli::GridArgs;
use crate::grid::{GridSummary, summarize};
use crate::model::{Coordinate, GridPoint, SearchArea};
use crate::util::write_json_stdout;

#[derive(Debug, Serialize)]
struct GridPreview {
    center: Coordinate,
    area: SearchArea,
    grid_dimension: usize,
    summary: Option<GridSummary>,
    points: Vec<GridPoint>,
}

pub fn run(args: GridArgs) -> Result<()> {
    let grid = resolve_grid(&args.area)?;
    let summary = match grid.area {
        SearchArea::Radius { radius_miles, .. } => Some(summarize(radius_miles, grid.dimension)),
        SearchArea::Bounds { .. } => None,
    };

    if args.json {
        return write_json_stdout(&GridPreview {
            center: grid.center,
            area: grid.area,
            grid_dimension: grid.dimension,
            summary,
            points: grid.points,
        });
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(
        output,
        "Grid: {}x{} = {} points around ({:.6}, {:.6})",
        grid.dimension,
        grid.dimension,
        grid.points.len(),
        grid.center.lat,
        grid.center.lng
    )?;
    if let Some(summary) = summary {
        writeln!(
            output,
            "Spacing: {:.2} mi  coverage area: {:.0} sq mi",
            summary.spacing_miles, summary.coverage_area_sq_miles
        )?;
    }
    for point in &grid.points {
        writeln!(
            output,
            "{}\t[{},{}]\t{:.6}\t{:.6}",
            point.index, point.row, point.col, point.lat, point.lng
        )?;
    }
    output.flush()?;
    Ok(())
}
