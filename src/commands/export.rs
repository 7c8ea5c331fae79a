use std::io::{self, BufWriter};

use anyhow::Result;
use tracing::info;

use crate::cli::{ExportArgs, ExportKind};
use crate::export::{write_competitors_csv, write_points_csv};
use crate::heatmap::{HeatMapSelection, select_entities};
use crate::model::{EntityStats, RunManifest};
use crate::util::{create_output_file, read_json};

pub fn run(args: ExportArgs) -> Result<()> {
    let manifest: RunManifest = read_json(&args.artifact)?;
    let target = match &args.business {
        Some(name) => {
            let selection = HeatMapSelection::Name(name.clone());
            select_entities(&manifest.aggregate, &selection)?
                .into_iter()
                .next()
        }
        None => None,
    };

    let rows = match &args.output_path {
        Some(path) => write_export(create_output_file(path)?, &args, &manifest, target)?,
        None => write_export(BufWriter::new(io::stdout().lock()), &args, &manifest, target)?,
    };

    info!(
        run_id = %manifest.run_id,
        kind = ?args.kind,
        rows,
        target = target.map(|stats| stats.entity_key.as_str()),
        "exported csv"
    );
    Ok(())
}

fn write_export<W: io::Write>(
    writer: W,
    args: &ExportArgs,
    manifest: &RunManifest,
    target: Option<&EntityStats>,
) -> Result<usize> {
    match args.kind {
        ExportKind::Competitors => write_competitors_csv(writer, &manifest.aggregate),
        ExportKind::Points => write_points_csv(writer, manifest, target),
    }
}
