use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags, params};
use serde::Serialize;

use crate::model::{RunManifest, SearchArea};
use crate::util::ensure_directory;

pub fn open_store(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

pub fn open_store_read_only(db_path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database read-only: {}", db_path.display()))
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS grid_runs (
          run_id TEXT PRIMARY KEY,
          created_at TEXT NOT NULL,
          search_term TEXT NOT NULL,
          center_lat REAL NOT NULL,
          center_lng REAL NOT NULL,
          radius_miles REAL,
          grid_dimension INTEGER NOT NULL,
          successful_points INTEGER NOT NULL,
          failed_points INTEGER NOT NULL,
          unique_entities INTEGER NOT NULL,
          skipped_records INTEGER NOT NULL,
          duration_ms INTEGER NOT NULL,
          artifact_path TEXT,
          artifact_sha256 TEXT
        );

        CREATE TABLE IF NOT EXISTS grid_competitors (
          run_id TEXT NOT NULL,
          entity_key TEXT NOT NULL,
          name TEXT,
          place_id TEXT,
          published_rank INTEGER NOT NULL,
          appearances INTEGER NOT NULL,
          coverage_percent REAL NOT NULL,
          avg_rank REAL NOT NULL,
          best_rank INTEGER NOT NULL,
          worst_rank INTEGER NOT NULL,
          top_3_count INTEGER NOT NULL,
          top_10_count INTEGER NOT NULL,
          PRIMARY KEY (run_id, entity_key),
          FOREIGN KEY(run_id) REFERENCES grid_runs(run_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS grid_rankings (
          run_id TEXT NOT NULL,
          entity_key TEXT NOT NULL,
          grid_index INTEGER NOT NULL,
          grid_row INTEGER NOT NULL,
          grid_col INTEGER NOT NULL,
          lat REAL NOT NULL,
          lng REAL NOT NULL,
          rank_position INTEGER NOT NULL,
          PRIMARY KEY (run_id, entity_key, grid_index),
          FOREIGN KEY(run_id) REFERENCES grid_runs(run_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_grid_runs_created ON grid_runs(created_at);
        ",
        )
        .context("failed to create run store schema")?;
    Ok(())
}

pub fn save_run(
    connection: &mut Connection,
    manifest: &RunManifest,
    artifact_path: Option<&Path>,
    artifact_sha256: Option<&str>,
) -> Result<()> {
    let tx = connection
        .transaction()
        .context("failed to begin run store transaction")?;

    tx.execute(
        "DELETE FROM grid_runs WHERE run_id = ?1",
        params![manifest.run_id],
    )
    .context("failed to clear previous run rows")?;

    let radius_miles = match manifest.params.area {
        SearchArea::Radius { radius_miles, .. } => Some(radius_miles),
        SearchArea::Bounds { .. } => None,
    };
    let aggregate = &manifest.aggregate;

    tx.execute(
        "INSERT INTO grid_runs (
           run_id, created_at, search_term, center_lat, center_lng, radius_miles,
           grid_dimension, successful_points, failed_points, unique_entities,
           skipped_records, duration_ms, artifact_path, artifact_sha256
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            manifest.run_id,
            manifest.generated_at,
            manifest.params.search_term,
            manifest.params.center.lat,
            manifest.params.center.lng,
            radius_miles,
            manifest.params.grid_dimension as i64,
            aggregate.successful_points as i64,
            aggregate.failed_points as i64,
            aggregate.total_unique_entities as i64,
            aggregate.skipped_records as i64,
            manifest.execution.duration_ms as i64,
            artifact_path.map(|path| path.display().to_string()),
            artifact_sha256,
        ],
    )
    .with_context(|| format!("failed to insert run {}", manifest.run_id))?;

    {
        let mut insert_competitor = tx.prepare(
            "INSERT INTO grid_competitors (
               run_id, entity_key, name, place_id, published_rank, appearances,
               coverage_percent, avg_rank, best_rank, worst_rank, top_3_count, top_10_count
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;
        let mut insert_ranking = tx.prepare(
            "INSERT INTO grid_rankings (
               run_id, entity_key, grid_index, grid_row, grid_col, lat, lng, rank_position
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;

        for (position, stats) in aggregate.entities.iter().enumerate() {
            insert_competitor
                .execute(params![
                    manifest.run_id,
                    stats.entity_key,
                    stats.business.name,
                    stats.business.place_id,
                    (position + 1) as i64,
                    stats.total_appearances as i64,
                    stats.coverage_percentage,
                    stats.average_rank,
                    stats.best_rank as i64,
                    stats.worst_rank as i64,
                    stats.top_3_count as i64,
                    stats.top_10_count as i64,
                ])
                .with_context(|| format!("failed to insert competitor {}", stats.entity_key))?;

            for observation in &stats.observations {
                insert_ranking.execute(params![
                    manifest.run_id,
                    stats.entity_key,
                    observation.index as i64,
                    observation.row as i64,
                    observation.col as i64,
                    observation.lat,
                    observation.lng,
                    observation.rank as i64,
                ])?;
            }
        }
    }

    tx.commit().context("failed to commit run store transaction")?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredRun {
    pub run_id: String,
    pub created_at: String,
    pub search_term: String,
    pub grid_dimension: i64,
    pub successful_points: i64,
    pub failed_points: i64,
    pub unique_entities: i64,
    pub leader: Option<String>,
    pub artifact_path: Option<String>,
}

pub fn recent_runs(connection: &Connection, limit: usize) -> Result<Vec<StoredRun>> {
    let mut statement = connection.prepare(
        "SELECT r.run_id, r.created_at, r.search_term, r.grid_dimension,
                r.successful_points, r.failed_points, r.unique_entities,
                (SELECT c.name FROM grid_competitors c
                  WHERE c.run_id = r.run_id AND c.published_rank = 1),
                r.artifact_path
           FROM grid_runs r
          ORDER BY r.created_at DESC, r.run_id DESC
          LIMIT ?1",
    )?;

    let rows = statement.query_map(params![limit as i64], |row| {
        Ok(StoredRun {
            run_id: row.get(0)?,
            created_at: row.get(1)?,
            search_term: row.get(2)?,
            grid_dimension: row.get(3)?,
            successful_points: row.get(4)?,
            failed_points: row.get(5)?,
            unique_entities: row.get(6)?,
            leader: row.get(7)?,
            artifact_path: row.get(8)?,
        })
    })?;

    let mut runs = Vec::new();
    for row in rows {
        runs.push(row.context("failed to read stored run")?);
    }
    Ok(runs)
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetitorSnapshot {
    pub entity_key: String,
    pub name: Option<String>,
    pub published_rank: i64,
    pub appearances: i64,
    pub coverage_percent: f64,
    pub avg_rank: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeadToHead {
    pub run_id: String,
    pub created_at: String,
    pub search_term: String,
    pub first: CompetitorSnapshot,
    pub second: CompetitorSnapshot,
}

// Each side matches an entity key or a raw place id. Only runs where both
// businesses were observed are returned, newest first.
pub fn compare_entities(
    connection: &Connection,
    first: &str,
    second: &str,
    search_term: Option<&str>,
) -> Result<Vec<HeadToHead>> {
    let (first, second) = (first.trim(), second.trim());
    if first.is_empty() || second.is_empty() {
        bail!("both businesses must be named for a comparison");
    }
    if first == second {
        bail!("cannot compare '{first}' with itself");
    }

    let mut statement = connection.prepare(
        "SELECT r.run_id, r.created_at, r.search_term,
                a.entity_key, a.name, a.published_rank, a.appearances, a.coverage_percent, a.avg_rank,
                b.entity_key, b.name, b.published_rank, b.appearances, b.coverage_percent, b.avg_rank
           FROM grid_competitors a
           JOIN grid_competitors b ON b.run_id = a.run_id
           JOIN grid_runs r ON r.run_id = a.run_id
          WHERE (a.entity_key = ?1 OR a.place_id = ?1)
            AND (b.entity_key = ?2 OR b.place_id = ?2)
            AND a.entity_key <> b.entity_key
            AND (?3 IS NULL OR r.search_term = ?3)
          ORDER BY r.created_at DESC, r.run_id DESC",
    )?;

    let rows = statement.query_map(params![first, second, search_term], |row| {
        Ok(HeadToHead {
            run_id: row.get(0)?,
            created_at: row.get(1)?,
            search_term: row.get(2)?,
            first: CompetitorSnapshot {
                entity_key: row.get(3)?,
                name: row.get(4)?,
                published_rank: row.get(5)?,
                appearances: row.get(6)?,
                coverage_percent: row.get(7)?,
                avg_rank: row.get(8)?,
            },
            second: CompetitorSnapshot {
                entity_key: row.get(9)?,
                name: row.get(10)?,
                published_rank: row.get(11)?,
                appearances: row.get(12)?,
                coverage_percent: row.get(13)?,
                avg_rank: row.get(14)?,
            },
        })
    })?;

    let mut comparisons = Vec::new();
    for row in rows {
        comparisons.push(row.context("failed to read comparison row")?);
    }
    Ok(comparisons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::model::{
        Coordinate, GridPoint, IdentityStrategy, Listing, PointResult, RunExecution, RunParams,
    };

    fn manifest(run_id: &str, generated_at: &str) -> RunManifest {
        let point = |index: usize| GridPoint {
            lat: 39.0,
            lng: -77.0 + index as f64 * 0.01,
            row: 0,
            col: index,
            index,
        };
        let listing = |id: &str| Listing {
            place_id: Some(id.to_string()),
            name: Some(format!("Business {id}")),
            ..Listing::default()
        };
        let point_results = vec![
            PointResult::success(point(0), vec![listing("a"), listing("b")]),
            PointResult::success(point(1), vec![listing("a")]),
            PointResult::failure(point(2), "timeout"),
        ];
        let aggregate = aggregate(&point_results, IdentityStrategy::IdThenName)
            .expect("aggregation should run");
        let center = Coordinate {
            lat: 39.0,
            lng: -77.0,
        };

        RunManifest {
            manifest_version: 1,
            run_id: run_id.to_string(),
            generated_at: generated_at.to_string(),
            params: RunParams {
                search_term: "medical spa".to_string(),
                center,
                area: SearchArea::Radius {
                    center,
                    radius_miles: 5.0,
                },
                grid_dimension: 3,
                batch_size: 10,
                point_timeout_ms: 30_000,
                inter_batch_delay_ms: 2_000,
                deadline_secs: None,
                max_results: 20,
                identity_strategy: "id-then-name".to_string(),
                provider: "replay".to_string(),
            },
            execution: RunExecution {
                started_at: generated_at.to_string(),
                duration_ms: 1200,
                total_points: 3,
                successful_points: 2,
                failed_points: 1,
                batches_run: 1,
                deadline_hit: false,
            },
            point_results,
            aggregate,
        }
    }

    fn memory_store() -> Connection {
        let connection = Connection::open_in_memory().expect("in-memory db should open");
        configure_connection(&connection).expect("pragmas should apply");
        ensure_schema(&connection).expect("schema should apply");
        connection
    }

    #[test]
    fn saved_run_is_listed_with_its_leader() {
        let mut connection = memory_store();
        save_run(
            &mut connection,
            &manifest("scan-1", "2026-01-01T00:00:00Z"),
            None,
            None,
        )
        .expect("run should save");

        let runs = recent_runs(&connection, 10).expect("runs should list");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].successful_points, 2);
        assert_eq!(runs[0].unique_entities, 2);
        assert_eq!(runs[0].leader.as_deref(), Some("Business a"));

        let rankings: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM grid_rankings WHERE run_id = 'scan-1'",
                [],
                |row| row.get(0),
            )
            .expect("count should run");
        assert_eq!(rankings, 3);
    }

    #[test]
    fn resaving_a_run_replaces_its_rows() {
        let mut connection = memory_store();
        let run = manifest("scan-1", "2026-01-01T00:00:00Z");
        save_run(&mut connection, &run, None, None).expect("first save");
        save_run(&mut connection, &run, None, Some("abc")).expect("second save");

        let competitors: i64 = connection
            .query_row("SELECT COUNT(*) FROM grid_competitors", [], |row| row.get(0))
            .expect("count should run");
        assert_eq!(competitors, 2);

        let rankings: i64 = connection
            .query_row("SELECT COUNT(*) FROM grid_rankings", [], |row| row.get(0))
            .expect("count should run");
        assert_eq!(rankings, 3);
    }

    #[test]
    fn recent_runs_are_newest_first_and_limited() {
        let mut connection = memory_store();
        for (run_id, at) in [
            ("scan-a", "2026-01-01T00:00:00Z"),
            ("scan-b", "2026-03-01T00:00:00Z"),
            ("scan-c", "2026-02-01T00:00:00Z"),
        ] {
            save_run(&mut connection, &manifest(run_id, at), None, None).expect("run should save");
        }

        let runs = recent_runs(&connection, 2).expect("runs should list");
        let ids = runs.iter().map(|run| run.run_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["scan-b", "scan-c"]);
    }

    #[test]
    fn comparison_pairs_two_businesses_across_runs() {
        let mut connection = memory_store();
        save_run(
            &mut connection,
            &manifest("scan-a", "2026-01-01T00:00:00Z"),
            None,
            None,
        )
        .expect("run should save");
        let mut other_term = manifest("scan-b", "2026-02-01T00:00:00Z");
        other_term.params.search_term = "botox".to_string();
        save_run(&mut connection, &other_term, None, None).expect("run should save");

        let rows = compare_entities(&connection, "a", "place:b", None).expect("compare should run");
        let ids = rows.iter().map(|row| row.run_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["scan-b", "scan-a"]);

        let latest = &rows[0];
        assert_eq!(latest.first.entity_key, "place:a");
        assert_eq!(latest.first.published_rank, 1);
        assert_eq!(latest.first.appearances, 2);
        assert_eq!(latest.first.coverage_percent, 100.0);
        assert_eq!(latest.second.name.as_deref(), Some("Business b"));
        assert_eq!(latest.second.appearances, 1);
        assert_eq!(latest.second.coverage_percent, 50.0);

        let filtered = compare_entities(&connection, "a", "b", Some("medical spa"))
            .expect("compare should run");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].run_id, "scan-a");

        let missing = compare_entities(&connection, "a", "zzz", None).expect("compare should run");
        assert!(missing.is_empty());
    }

    #[test]
    fn comparison_requires_two_distinct_businesses() {
        let connection = memory_store();
        let error = compare_entities(&connection, "place:a", " place:a ", None)
            .expect_err("self comparison should fail");
        assert!(error.to_string().contains("itself"), "{error}");
        assert!(compare_entities(&connection, "", "b", None).is_err());
    }
}
