use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::info;

use crate::cli::InventoryArgs;
use crate::model::{SourceEntry, SourceInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.input_dir)?;

    if args.dry_run {
        info!(
            pdf_count = manifest.pdf_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.output_root
            .join("manifests")
            .join("source_inventory.json")
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(pdf_count = manifest.pdf_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(input_dir: &Path) -> Result<SourceInventoryManifest> {
    let pattern = Regex::new(r"^(?P<exam>.+?)_(?P<year>\d{4})\.pdf$")
        .context("failed to compile source filename regex")?;

    let mut pdf_paths = discover_pdfs(input_dir)?;
    pdf_paths.sort();

    if pdf_paths.is_empty() {
        bail!("no PDFs found in {}", input_dir.display());
    }

    let mut pdfs = Vec::with_capacity(pdf_paths.len());
    for path in pdf_paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        let (exam, year) = parse_exam_year(&filename, &pattern)?;
        let sha256 = sha256_file(&path)?;

        pdfs.push(SourceEntry {
            filename,
            exam,
            year,
            sha256,
        });
    }

    pdfs.sort_by(|a, b| {
        a.exam
            .cmp(&b.exam)
            .then(a.year.cmp(&b.year))
            .then(a.filename.cmp(&b.filename))
    });

    Ok(SourceInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: input_dir.display().to_string(),
        pdf_count: pdfs.len(),
        pdfs,
    })
}

fn discover_pdfs(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();

    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("failed to read {}", input_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", input_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            pdfs.push(path);
        }
    }

    Ok(pdfs)
}

fn parse_exam_year(filename: &str, pattern: &Regex) -> Result<(String, u32)> {
    let captures = pattern.captures(filename).with_context(|| {
        format!("filename does not match the {{Exam}}_{{Year}}.pdf pattern: {filename}")
    })?;

    let exam = captures
        .name("exam")
        .map(|m| m.as_str().to_string())
        .context("missing exam capture")?;

    let year = captures
        .name("year")
        .map(|m| m.as_str())
        .context("missing year capture")?
        .parse::<u32>()
        .with_context(|| format!("invalid year in filename: {filename}"))?;

    Ok((exam, year))
}
