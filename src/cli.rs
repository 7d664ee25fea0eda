use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "examocr",
    version,
    about = "Local exam-paper OCR extraction and dataset tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Extract(ExtractArgs),
    Build(BuildArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = "input_pdfs")]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "output")]
    pub output_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = "input_pdfs")]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "output")]
    pub output_root: PathBuf,

    #[arg(long)]
    pub inventory_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub extract_manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub refresh_inventory: bool,

    #[arg(long = "target-exam")]
    pub target_exams: Vec<String>,

    #[arg(long)]
    pub max_pages_per_doc: Option<usize>,

    #[arg(long, default_value_t = 300)]
    pub render_dpi: u32,

    #[arg(long, default_value = "eng")]
    pub ocr_lang: String,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[arg(long, default_value = "output")]
    pub output_root: PathBuf,

    #[arg(long)]
    pub ocr_dir: Option<PathBuf>,

    #[arg(long)]
    pub datasets_dir: Option<PathBuf>,

    #[arg(long)]
    pub build_manifest_path: Option<PathBuf>,

    #[arg(long, default_value = "syllabus/UPSC.json")]
    pub syllabus_path: PathBuf,

    #[arg(long = "target-source")]
    pub target_sources: Vec<String>,

    #[arg(long, default_value = "https://api.groq.com/openai/v1")]
    pub llm_base_url: String,

    #[arg(long, default_value = "llama-3.3-70b-versatile")]
    pub llm_model: String,

    #[arg(long, default_value_t = 2048)]
    pub llm_max_tokens: u32,

    #[arg(long, default_value_t = false)]
    pub log_raw_responses: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "output")]
    pub output_root: PathBuf,
}
