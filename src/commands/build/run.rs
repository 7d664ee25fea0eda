use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::cli::BuildArgs;
use crate::llm::LlmClient;
use crate::model::{
    BuildCounts, BuildPaths, BuildRunManifest, DatasetEntry, QuestionFormat, QuestionRecord,
};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

use super::beautify::{StatementLineBreaker, format_table_block};
use super::blocks::BlockDetector;
use super::classify::FormatClassifier;
use super::match_format::MatchFormatter;
use super::options::{OptionNormalizer, fix_ocr_prefix};
use super::reconstruct::TextReconstructor;
use super::sanitize::{SanitizeOutcome, sanitize_block_response};
use super::syllabus::load_syllabus;
use super::types::DraftQuestion;

struct Pipeline {
    reconstructor: TextReconstructor,
    detector: BlockDetector,
    classifier: FormatClassifier,
    line_breaker: StatementLineBreaker,
    match_formatter: MatchFormatter,
    option_normalizer: OptionNormalizer,
}

impl Pipeline {
    fn new() -> Result<Self> {
        Ok(Self {
            reconstructor: TextReconstructor::new()?,
            detector: BlockDetector::new()?,
            classifier: FormatClassifier::new()?,
            line_breaker: StatementLineBreaker::new()?,
            match_formatter: MatchFormatter::new()?,
            option_normalizer: OptionNormalizer::new()?,
        })
    }
}

#[derive(Debug)]
struct OcrFile {
    page: u32,
    column: u32,
    path: PathBuf,
}

pub fn run(args: BuildArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let output_root = args.output_root.clone();
    let ocr_dir = args
        .ocr_dir
        .clone()
        .unwrap_or_else(|| output_root.join("ocr_raw"));
    let datasets_dir = args
        .datasets_dir
        .clone()
        .unwrap_or_else(|| output_root.join("datasets"));
    let manifest_dir = output_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    ensure_directory(&datasets_dir)?;

    let build_manifest_path = args.build_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("build_run_{}.json", utc_compact_string(started_ts)))
    });

    info!(ocr_dir = %ocr_dir.display(), run_id = %run_id, "starting dataset build");

    let syllabus_context = load_syllabus(&args.syllabus_path)?;
    let llm = LlmClient::new(&args.llm_base_url, &args.llm_model, args.llm_max_tokens)?;
    let pipeline = Pipeline::new()?;

    let mut sources = discover_sources(&ocr_dir)?;
    if !args.target_sources.is_empty() {
        sources.retain(|tag, _| args.target_sources.iter().any(|target| target == tag));
    }
    if sources.is_empty() {
        bail!("no OCR text files found in {}", ocr_dir.display());
    }

    let raw_log_dir = if args.log_raw_responses {
        let dir = output_root.join("logs").join("raw_blocks");
        ensure_directory(&dir)?;
        Some(dir)
    } else {
        None
    };

    let mut counts = BuildCounts::default();
    let mut warnings = Vec::<String>::new();
    let mut datasets = Vec::<DatasetEntry>::new();

    for (tag, files) in &sources {
        counts.source_count += 1;
        let mut records = Vec::<QuestionRecord>::new();

        for file in files {
            let text = match fs::read_to_string(&file.path) {
                Ok(text) => text,
                Err(error) => {
                    let message =
                        format!("failed to read {}: {error}", file.path.display());
                    warn!(path = %file.path.display(), error = %error, "skipping OCR file");
                    warnings.push(message);
                    continue;
                }
            };
            counts.ocr_files_processed += 1;

            let reconstructed = pipeline.reconstructor.reconstruct(&text);
            let blocks = pipeline.detector.detect(&reconstructed);
            counts.blocks_detected += blocks.len();

            for block in blocks {
                let sequence = records.len() + 1;
                let id = format!("{tag}_q{sequence}");
                let record = process_block(
                    &pipeline,
                    &llm,
                    &syllabus_context,
                    &id,
                    &block,
                    raw_log_dir.as_deref(),
                    &mut counts,
                    &mut warnings,
                );

                counts.records_total += 1;
                if record.extracted_successfully {
                    count_format(&mut counts, record.format);
                } else {
                    counts.records_failed += 1;
                }
                records.push(record);
            }
        }

        let dataset_path = datasets_dir.join(format!("{tag}.json"));
        write_json_pretty(&dataset_path, &records)?;

        let failed_count = records
            .iter()
            .filter(|record| !record.extracted_successfully)
            .count();
        info!(
            source = %tag,
            records = records.len(),
            failed = failed_count,
            path = %dataset_path.display(),
            "wrote dataset"
        );

        datasets.push(DatasetEntry {
            source_tag: tag.clone(),
            path: dataset_path.display().to_string(),
            record_count: records.len(),
            failed_count,
        });
    }

    let manifest = BuildRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_build_command(&args),
        llm_base_url: args.llm_base_url.clone(),
        llm_model: args.llm_model.clone(),
        paths: BuildPaths {
            output_root: output_root.display().to_string(),
            ocr_dir: ocr_dir.display().to_string(),
            datasets_dir: datasets_dir.display().to_string(),
            syllabus_path: args.syllabus_path.display().to_string(),
        },
        counts,
        datasets,
        warnings,
    };

    write_json_pretty(&build_manifest_path, &manifest)?;

    info!(path = %build_manifest_path.display(), "wrote build run manifest");
    info!(
        sources = manifest.counts.source_count,
        blocks = manifest.counts.blocks_detected,
        records = manifest.counts.records_total,
        failed = manifest.counts.records_failed,
        "dataset build completed"
    );

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn process_block(
    pipeline: &Pipeline,
    llm: &LlmClient,
    syllabus_context: &str,
    id: &str,
    block_text: &str,
    raw_log_dir: Option<&Path>,
    counts: &mut BuildCounts,
    warnings: &mut Vec<String>,
) -> QuestionRecord {
    let raw_response = match llm.parse_block(block_text, syllabus_context) {
        Ok(response) => response,
        Err(error) => {
            let message = format!("{id}: parse service call failed: {error:#}");
            warn!(id = %id, error = %error, "parse service call failed");
            warnings.push(message.clone());
            return sentinel_record(id, block_text, message, None);
        }
    };

    if let Some(log_dir) = raw_log_dir {
        let log_path = log_dir.join(format!("{id}.txt"));
        if let Err(error) = fs::write(&log_path, &raw_response) {
            warn!(path = %log_path.display(), error = %error, "failed to log raw response");
        }
    }

    let (value, repaired) = match sanitize_block_response(&raw_response, llm) {
        SanitizeOutcome::Parsed { value, repaired } => (value, repaired),
        SanitizeOutcome::Failed {
            error,
            raw_text_excerpt,
        } => {
            counts.repair_attempts += 1;
            let message = format!("{id}: {error}");
            warn!(id = %id, error = %error, "block response unusable after repair");
            warnings.push(message);
            return sentinel_record(id, block_text, error, Some(raw_text_excerpt));
        }
    };
    if repaired {
        counts.repair_attempts += 1;
        counts.repair_successes += 1;
    }

    let draft = DraftQuestion::from_value(&value);
    let question_source = if draft.question.is_empty() {
        block_text.trim()
    } else {
        draft.question.as_str()
    };

    let format = pipeline.classifier.classify(question_source);
    debug!(id = %id, format = format.as_str(), repaired, "classified block");

    let question = match format {
        QuestionFormat::Table => format_table_block(question_source),
        QuestionFormat::Statement => pipeline.line_breaker.break_statements(question_source),
        QuestionFormat::Match => pipeline.match_formatter.format(question_source),
        _ => question_source.to_string(),
    };

    let (mut options, dropped) = pipeline.option_normalizer.normalize(&draft.options);
    counts.option_keys_dropped += dropped;

    for value in options.values_mut() {
        let (fixed, changed) = fix_ocr_prefix(value);
        if changed {
            counts.glitch_fixes_applied += 1;
            *value = fixed;
        }
    }

    QuestionRecord {
        id: id.to_string(),
        question,
        options,
        format,
        subject: draft.subject,
        topic: draft.topic,
        sub_topic: draft.sub_topic,
        keywords: draft.keywords,
        correct_answer: draft.correct_answer,
        is_multi_correct: draft.is_multi_correct,
        extracted_successfully: true,
        error: None,
        raw_text_excerpt: None,
    }
}

fn sentinel_record(
    id: &str,
    block_text: &str,
    error: String,
    raw_text_excerpt: Option<String>,
) -> QuestionRecord {
    QuestionRecord {
        id: id.to_string(),
        question: block_text.trim().to_string(),
        options: BTreeMap::new(),
        format: QuestionFormat::Single,
        subject: None,
        topic: None,
        sub_topic: None,
        keywords: Vec::new(),
        correct_answer: None,
        is_multi_correct: false,
        extracted_successfully: false,
        error: Some(error),
        raw_text_excerpt,
    }
}

fn count_format(counts: &mut BuildCounts, format: QuestionFormat) {
    match format {
        QuestionFormat::Single => counts.single_count += 1,
        QuestionFormat::Statement => counts.statement_count += 1,
        QuestionFormat::Table => counts.table_count += 1,
        QuestionFormat::Match => counts.match_count += 1,
        QuestionFormat::Assertion => counts.assertion_count += 1,
        QuestionFormat::Paragraph => counts.paragraph_count += 1,
    }
}

fn discover_sources(ocr_dir: &Path) -> Result<BTreeMap<String, Vec<OcrFile>>> {
    let pattern = Regex::new(r"^(?P<tag>.+_\d{4})_p(?P<page>\d+)_c(?P<col>\d+)\.txt$")
        .context("failed to compile OCR filename pattern")?;

    let mut sources = BTreeMap::<String, Vec<OcrFile>>::new();

    let entries = fs::read_dir(ocr_dir)
        .with_context(|| format!("failed to read {}", ocr_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", ocr_dir.display()))?;
        let path = entry.path();

        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(caps) = pattern.captures(filename) else {
            continue;
        };

        let tag = caps["tag"].to_string();
        let page = caps["page"].parse::<u32>().unwrap_or(0);
        let column = caps["col"].parse::<u32>().unwrap_or(0);

        sources
            .entry(tag)
            .or_default()
            .push(OcrFile { page, column, path });
    }

    for files in sources.values_mut() {
        files.sort_by_key(|file| (file.page, file.column));
    }

    Ok(sources)
}

fn render_build_command(args: &BuildArgs) -> String {
    let mut command = vec![
        "examocr".to_string(),
        "build".to_string(),
        "--output-root".to_string(),
        args.output_root.display().to_string(),
        "--syllabus-path".to_string(),
        args.syllabus_path.display().to_string(),
        "--llm-base-url".to_string(),
        args.llm_base_url.clone(),
        "--llm-model".to_string(),
        args.llm_model.clone(),
    ];

    for target in &args.target_sources {
        command.push("--target-source".to_string());
        command.push(target.clone());
    }
    if args.log_raw_responses {
        command.push("--log-raw-responses".to_string());
    }

    command.join(" ")
}
