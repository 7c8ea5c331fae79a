use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn scan_run_id(started: DateTime<Utc>) -> String {
    format!("scan-{}", started.format("%Y%m%dT%H%M%S%.3fZ"))
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn create_output_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open artifact for hashing: {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("failed to hash artifact: {}", path.display()))?;
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

// Written beside the target and renamed into place, so a reader never sees a
// half-written artifact.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let staging = path.with_extension("json.partial");
    {
        let mut output = create_output_file(&staging)?;
        serde_json::to_writer_pretty(&mut output, value)
            .with_context(|| format!("failed to serialize json: {}", path.display()))?;
        output
            .write_all(b"\n")
            .and_then(|()| output.flush())
            .with_context(|| format!("failed to write json file: {}", staging.display()))?;
    }
    fs::rename(&staging, path)
        .with_context(|| format!("failed to move json into place: {}", path.display()))
}

pub fn write_json_stdout<T: Serialize>(value: &T) -> Result<()> {
    let mut output = BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value).context("failed to serialize json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
