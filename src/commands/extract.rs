use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::commands::inventory;
use crate::model::{
    ExtractCounts, ExtractPaths, ExtractRunManifest, SourceEntry, SourceInventoryManifest,
    ToolVersions,
};
use crate::util::{
    ensure_directory, now_utc_string, read_json, utc_compact_string, write_json_pretty,
};

// Scanned papers place two columns almost exactly at mid-width; the margin
// keeps the cut from clipping glyphs on either side.
const COLUMN_SPLIT_RATIO: f64 = 0.50;
const COLUMN_MARGIN_RATIO: f64 = 0.02;
const POINTS_PER_INCH: f64 = 72.0;

#[derive(Debug)]
struct PageGeometry {
    pages: usize,
    width_pts: f64,
    height_pts: f64,
}

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let manifest_dir = args.output_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let inventory_manifest_path = args
        .inventory_manifest_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join("source_inventory.json"));
    let extract_manifest_path = args.extract_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "extract_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let ocr_dir = args.output_root.join("ocr_raw");
    ensure_directory(&ocr_dir)?;

    info!(input_dir = %args.input_dir.display(), run_id = %run_id, "starting extraction");

    let inventory = load_or_refresh_inventory(
        &args.input_dir,
        &inventory_manifest_path,
        args.refresh_inventory,
    )?;

    let tool_versions = collect_tool_versions()?;

    let mut counts = ExtractCounts {
        pdf_count: inventory.pdf_count,
        ..ExtractCounts::default()
    };
    let mut warnings = Vec::<String>::new();

    for pdf in &inventory.pdfs {
        if !args.target_exams.is_empty() && !args.target_exams.contains(&pdf.exam) {
            continue;
        }

        let pdf_path = args.input_dir.join(&pdf.filename);
        match process_source(&pdf_path, pdf, &ocr_dir, &args, &mut counts, &mut warnings) {
            Ok(()) => counts.processed_pdf_count += 1,
            Err(error) => {
                let message = format!("failed to extract {}: {error:#}", pdf.filename);
                warn!(pdf = %pdf.filename, error = %error, "extraction failed for source");
                warnings.push(message);
            }
        }
    }

    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_extract_command(&args),
        tool_versions,
        paths: ExtractPaths {
            input_dir: args.input_dir.display().to_string(),
            output_root: args.output_root.display().to_string(),
            ocr_dir: ocr_dir.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.display().to_string(),
        },
        counts,
        source_hashes: inventory.pdfs,
        warnings,
    };

    write_json_pretty(&extract_manifest_path, &manifest)?;

    info!(path = %extract_manifest_path.display(), "wrote extract run manifest");
    info!(
        pdfs = manifest.counts.processed_pdf_count,
        pages = manifest.counts.page_count,
        columns = manifest.counts.column_count,
        "extraction completed"
    );

    Ok(())
}

fn process_source(
    pdf_path: &Path,
    pdf: &SourceEntry,
    ocr_dir: &Path,
    args: &ExtractArgs,
    counts: &mut ExtractCounts,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let geometry = query_page_geometry(pdf_path)?;
    let tag = pdf.tag();

    let page_count = match args.max_pages_per_doc {
        Some(max_pages) => geometry.pages.min(max_pages),
        None => geometry.pages,
    };

    let width_px = pixels(geometry.width_pts, args.render_dpi);
    let height_px = pixels(geometry.height_pts, args.render_dpi);
    let mid = (width_px as f64 * COLUMN_SPLIT_RATIO) as u32;
    let margin = (width_px as f64 * COLUMN_MARGIN_RATIO) as u32;

    let columns = [
        (0u32, mid.saturating_sub(margin)),
        (mid + margin, width_px.saturating_sub(mid + margin)),
    ];

    for page in 1..=page_count {
        for (column_index, (x, width)) in columns.iter().enumerate() {
            let column = column_index + 1;

            match ocr_column(pdf_path, page, *x, *width, height_px, args) {
                Ok(text) => {
                    let out_path = ocr_dir.join(format!("{tag}_p{page}_c{column}.txt"));
                    fs::write(&out_path, &text)
                        .with_context(|| format!("failed to write {}", out_path.display()))?;

                    counts.column_count += 1;
                    if text.trim().is_empty() {
                        counts.empty_column_count += 1;
                    }
                }
                Err(error) => {
                    let message = format!(
                        "OCR failed for {} page {page} column {column}: {error:#}",
                        pdf.filename
                    );
                    warn!(pdf = %pdf.filename, page, column, error = %error, "OCR failed");
                    warnings.push(message);
                }
            }
        }
        counts.page_count += 1;
    }

    Ok(())
}

fn ocr_column(
    pdf_path: &Path,
    page: usize,
    x: u32,
    width: u32,
    height: u32,
    args: &ExtractArgs,
) -> Result<String> {
    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let output_root = std::env::temp_dir().join(format!(
        "examocr_{}_{}_{}_{}",
        std::process::id(),
        page,
        x,
        stamp
    ));
    let png_path = PathBuf::from(format!("{}.png", output_root.display()));

    let pdftoppm_output = Command::new("pdftoppm")
        .arg("-f")
        .arg(page.to_string())
        .arg("-l")
        .arg(page.to_string())
        .arg("-r")
        .arg(args.render_dpi.to_string())
        .arg("-x")
        .arg(x.to_string())
        .arg("-y")
        .arg("0")
        .arg("-W")
        .arg(width.to_string())
        .arg("-H")
        .arg(height.to_string())
        .arg("-singlefile")
        .arg("-png")
        .arg(pdf_path)
        .arg(&output_root)
        .output()
        .with_context(|| format!("failed to execute pdftoppm for {}", pdf_path.display()))?;

    if !pdftoppm_output.status.success() {
        let stderr = String::from_utf8_lossy(&pdftoppm_output.stderr);
        bail!(
            "pdftoppm returned non-zero exit status for {} page {}: {}",
            pdf_path.display(),
            page,
            stderr.trim()
        );
    }

    if !png_path.exists() {
        bail!(
            "pdftoppm did not produce expected image for {} page {}",
            pdf_path.display(),
            page
        );
    }

    let tesseract_output = Command::new("tesseract")
        .arg(&png_path)
        .arg("stdout")
        .arg("-l")
        .arg(&args.ocr_lang)
        .output()
        .with_context(|| format!("failed to execute tesseract for {}", png_path.display()))?;

    let _ = fs::remove_file(&png_path);

    if !tesseract_output.status.success() {
        let stderr = String::from_utf8_lossy(&tesseract_output.stderr);
        bail!(
            "tesseract returned non-zero exit status for {} page {}: {}",
            pdf_path.display(),
            page,
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&tesseract_output.stdout)
        .replace('\u{0000}', "")
        .trim()
        .to_string())
}

fn query_page_geometry(pdf_path: &Path) -> Result<PageGeometry> {
    let output = Command::new("pdfinfo")
        .arg(pdf_path)
        .output()
        .with_context(|| format!("failed to execute pdfinfo for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdfinfo returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut pages = None;
    let mut width_pts = None;
    let mut height_pts = None;

    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Pages:") {
            pages = rest.trim().parse::<usize>().ok();
        }
        if let Some(rest) = line.strip_prefix("Page size:") {
            let fields = rest.split_whitespace().collect::<Vec<&str>>();
            if fields.len() >= 3 && fields[1] == "x" {
                width_pts = fields[0].parse::<f64>().ok();
                height_pts = fields[2].parse::<f64>().ok();
            }
        }
    }

    Ok(PageGeometry {
        pages: pages
            .with_context(|| format!("pdfinfo reported no page count for {}", pdf_path.display()))?,
        width_pts: width_pts
            .with_context(|| format!("pdfinfo reported no page size for {}", pdf_path.display()))?,
        height_pts: height_pts
            .with_context(|| format!("pdfinfo reported no page size for {}", pdf_path.display()))?,
    })
}

fn pixels(points: f64, dpi: u32) -> u32 {
    (points / POINTS_PER_INCH * dpi as f64).round() as u32
}

fn load_or_refresh_inventory(
    input_dir: &Path,
    inventory_manifest_path: &Path,
    refresh_inventory: bool,
) -> Result<SourceInventoryManifest> {
    if refresh_inventory || !inventory_manifest_path.exists() {
        let manifest = inventory::build_manifest(input_dir)?;
        write_json_pretty(inventory_manifest_path, &manifest)?;
        info!(
            path = %inventory_manifest_path.display(),
            pdf_count = manifest.pdf_count,
            "refreshed inventory manifest"
        );
        return Ok(manifest);
    }

    let manifest: SourceInventoryManifest = read_json(inventory_manifest_path)?;

    info!(
        path = %inventory_manifest_path.display(),
        pdf_count = manifest.pdf_count,
        "loaded existing inventory manifest"
    );

    Ok(manifest)
}

fn collect_tool_versions() -> Result<ToolVersions> {
    Ok(ToolVersions {
        rustc: command_version("rustc", &["--version"])?,
        cargo: command_version("cargo", &["--version"])?,
        pdfinfo: command_version("pdfinfo", &["-v"])?,
        pdftoppm: command_version("pdftoppm", &["-v"])?,
        tesseract: command_version("tesseract", &["--version"])?,
    })
}

fn command_version(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run {} {}", program, args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{} {} failed: {}", program, args.join(" "), stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    let version_line = source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .unwrap_or("unknown");

    Ok(version_line.to_string())
}

fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = vec![
        "examocr".to_string(),
        "extract".to_string(),
        "--input-dir".to_string(),
        args.input_dir.display().to_string(),
        "--output-root".to_string(),
        args.output_root.display().to_string(),
        "--render-dpi".to_string(),
        args.render_dpi.to_string(),
        "--ocr-lang".to_string(),
        args.ocr_lang.clone(),
    ];

    if args.refresh_inventory {
        command.push("--refresh-inventory".to_string());
    }
    for exam in &args.target_exams {
        command.push("--target-exam".to_string());
        command.push(exam.clone());
    }
    if let Some(max_pages) = args.max_pages_per_doc {
        command.push("--max-pages-per-doc".to_string());
        command.push(max_pages.to_string());
    }

    command.join(" ")
}
