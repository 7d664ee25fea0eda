use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::{QuestionRecord, SourceInventoryManifest};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.output_root.join("manifests");
    let inventory_path = manifest_dir.join("source_inventory.json");
    let datasets_dir = args.output_root.join("datasets");

    info!(output_root = %args.output_root.display(), "status requested");

    if inventory_path.exists() {
        let inventory: SourceInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            pdf_count = inventory.pdf_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    match latest_build_manifest(&manifest_dir)? {
        Some(path) => {
            let manifest: Value = read_json(&path)?;
            info!(
                path = %path.display(),
                run_id = %manifest.get("run_id").and_then(|v| v.as_str()).unwrap_or_default(),
                status = %manifest.get("status").and_then(|v| v.as_str()).unwrap_or_default(),
                records = manifest
                    .pointer("/counts/records_total")
                    .and_then(|v| v.as_u64())
                    .unwrap_or_default(),
                failed = manifest
                    .pointer("/counts/records_failed")
                    .and_then(|v| v.as_u64())
                    .unwrap_or_default(),
                "loaded latest build run manifest"
            );
        }
        None => warn!(path = %manifest_dir.display(), "no build run manifest found"),
    }

    report_datasets(&datasets_dir)?;

    Ok(())
}

fn latest_build_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;

    let mut candidates = Vec::<PathBuf>::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();

        let is_build_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("build_run_") && name.ends_with(".json"))
            .unwrap_or(false);

        if is_build_manifest {
            candidates.push(path);
        }
    }

    // Run ids embed a compact UTC stamp, so lexical order is chronological.
    candidates.sort();
    Ok(candidates.pop())
}

fn report_datasets(datasets_dir: &Path) -> Result<()> {
    if !datasets_dir.exists() {
        warn!(path = %datasets_dir.display(), "datasets directory missing");
        return Ok(());
    }

    let entries = fs::read_dir(datasets_dir)
        .with_context(|| format!("failed to read {}", datasets_dir.display()))?;

    let mut dataset_count = 0usize;
    let mut record_total = 0usize;
    let mut failed_total = 0usize;

    let mut paths = Vec::<PathBuf>::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", datasets_dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        let records: Vec<QuestionRecord> = match read_json(&path) {
            Ok(records) => records,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "failed to read dataset");
                continue;
            }
        };

        let failed = records
            .iter()
            .filter(|record| !record.extracted_successfully)
            .count();

        info!(
            path = %path.display(),
            records = records.len(),
            failed,
            "dataset status"
        );

        dataset_count += 1;
        record_total += records.len();
        failed_total += failed;
    }

    if dataset_count == 0 {
        warn!(path = %datasets_dir.display(), "no datasets found");
    } else {
        info!(
            datasets = dataset_count,
            records = record_total,
            failed = failed_total,
            "dataset totals"
        );
    }

    Ok(())
}
