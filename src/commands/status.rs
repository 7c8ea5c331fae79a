use std::io::{self, Write};

use anyhow::Result;
use tracing::{info, warn};

use super::scan::default_db_path;
use crate::cli::StatusArgs;
use crate::store::{open_store_read_only, recent_runs};
use crate::util::write_json_stdout;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root));

    info!(cache_root = %args.cache_root.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "run store missing");
        return Ok(());
    }

    let connection = open_store_read_only(&db_path)?;
    let runs = recent_runs(&connection, args.limit)?;
    info!(path = %db_path.display(), runs = runs.len(), "loaded stored runs");

    if args.json {
        return write_json_stdout(&runs);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    for run in &runs {
        writeln!(
            output,
            "{}\t{}\t\"{}\"\t{}x{}\tok={} failed={}\tentities={}\tleader={}",
            run.run_id,
            run.created_at,
            run.search_term,
            run.grid_dimension,
            run.grid_dimension,
            run.successful_points,
            run.failed_points,
            run.unique_entities,
            run.leader.as_deref().unwrap_or("-"),
        )?;
    }
    output.flush()?;
    Ok(())
}
