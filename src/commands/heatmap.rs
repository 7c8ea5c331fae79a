use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::HeatmapArgs;
use crate::heatmap::{HeatMapPolicy, HeatMapSelection, render, render_text, select_entities};
use crate::model::{HeatMap, RunManifest};
use crate::util::{read_json, write_json_stdout};

pub fn run(args: HeatmapArgs) -> Result<()> {
    let manifest: RunManifest = read_json(&args.artifact)?;
    let policy = HeatMapPolicy::from_thresholds(&args.tiers)?;
    let selection = match &args.business {
        Some(name) => HeatMapSelection::Name(name.clone()),
        None => HeatMapSelection::Top(args.top),
    };

    let selected = select_entities(&manifest.aggregate, &selection)?;
    let heat_maps = selected
        .into_iter()
        .map(|stats| render(stats, manifest.params.grid_dimension, &policy))
        .collect::<Result<Vec<HeatMap>>>()?;

    info!(
        run_id = %manifest.run_id,
        heat_maps = heat_maps.len(),
        grid_dimension = manifest.params.grid_dimension,
        "rendered heat maps"
    );

    if args.json {
        return write_json_stdout(&heat_maps);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    for heat_map in &heat_maps {
        write!(output, "{}", render_text(heat_map))?;
        writeln!(output)?;
    }
    output.flush()?;
    Ok(())
}
