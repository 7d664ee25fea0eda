use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub filename: String,
    pub exam: String,
    pub year: u32,
    pub sha256: String,
}

impl SourceEntry {
    pub fn tag(&self) -> String {
        format!("{}_{}", self.exam, self.year)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub pdf_count: usize,
    pub pdfs: Vec<SourceEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub rustc: String,
    pub cargo: String,
    pub pdfinfo: String,
    pub pdftoppm: String,
    pub tesseract: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractPaths {
    pub input_dir: String,
    pub output_root: String,
    pub ocr_dir: String,
    pub inventory_manifest_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractCounts {
    pub pdf_count: usize,
    pub processed_pdf_count: usize,
    pub page_count: usize,
    pub column_count: usize,
    pub empty_column_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub paths: ExtractPaths,
    pub counts: ExtractCounts,
    pub source_hashes: Vec<SourceEntry>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildPaths {
    pub output_root: String,
    pub ocr_dir: String,
    pub datasets_dir: String,
    pub syllabus_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildCounts {
    pub source_count: usize,
    pub ocr_files_processed: usize,
    pub blocks_detected: usize,
    pub records_total: usize,
    pub records_failed: usize,
    pub repair_attempts: usize,
    pub repair_successes: usize,
    pub option_keys_dropped: usize,
    pub glitch_fixes_applied: usize,
    pub single_count: usize,
    pub statement_count: usize,
    pub table_count: usize,
    pub match_count: usize,
    pub assertion_count: usize,
    pub paragraph_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetEntry {
    pub source_tag: String,
    pub path: String,
    pub record_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub paths: BuildPaths,
    pub counts: BuildCounts,
    pub datasets: Vec<DatasetEntry>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionFormat {
    Single,
    Statement,
    Table,
    Match,
    Assertion,
    Paragraph,
}

impl QuestionFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionFormat::Single => "single",
            QuestionFormat::Statement => "statement",
            QuestionFormat::Table => "table",
            QuestionFormat::Match => "match",
            QuestionFormat::Assertion => "assertion",
            QuestionFormat::Paragraph => "paragraph",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    pub question: String,
    pub options: BTreeMap<String, String>,
    pub format: QuestionFormat,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub sub_topic: Option<String>,
    pub keywords: Vec<String>,
    pub correct_answer: Option<String>,
    pub is_multi_correct: bool,
    pub extracted_successfully: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text_excerpt: Option<String>,
}
