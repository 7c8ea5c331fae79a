use std::io::{self, Write};

use anyhow::Result;
use tracing::{info, warn};

use super::scan::default_db_path;
use crate::cli::CompareArgs;
use crate::store::{CompetitorSnapshot, compare_entities, open_store_read_only};
use crate::util::write_json_stdout;

pub fn run(args: CompareArgs) -> Result<()> {
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root));

    if !db_path.exists() {
        warn!(path = %db_path.display(), "run store missing");
        return Ok(());
    }

    let connection = open_store_read_only(&db_path)?;
    let rows = compare_entities(&connection, &args.first, &args.second, args.term.as_deref())?;
    info!(
        first = %args.first,
        second = %args.second,
        runs = rows.len(),
        "loaded head-to-head comparison"
    );

    if args.json {
        return write_json_stdout(&rows);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    for row in &rows {
        writeln!(
            output,
            "{}\t{}\t\"{}\"\t{}\t{}",
            row.run_id,
            row.created_at,
            row.search_term,
            describe(&row.first),
            describe(&row.second),
        )?;
    }
    output.flush()?;
    Ok(())
}

fn describe(snapshot: &CompetitorSnapshot) -> String {
    format!(
        "{} #{} coverage={:.1}% ({}) avg=#{:.2}",
        snapshot.name.as_deref().unwrap_or(&snapshot.entity_key),
        snapshot.published_rank,
        snapshot.coverage_percent,
        snapshot.appearances,
        snapshot.avg_rank,
    )
}
