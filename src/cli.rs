use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::citation::segment::{DEFAULT_MAX_CHUNK_CHARS, DEFAULT_MIN_PARAGRAPH_CHARS};
use crate::llm::{DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use crate::semantic::DEFAULT_MODEL_ID;

pub const DEFAULT_CACHE_ROOT: &str = ".cache/ragcite";
pub const DEFAULT_DATA_ROOT: &str = "data";
pub const DB_FILENAME: &str = "ragcite_index.sqlite";

#[derive(Parser, Debug)]
#[command(
    name = "ragcite",
    version,
    about = "Retrieval-grounded answers with traceable, renumbered source citations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Ingest(IngestArgs),
    Query(QueryArgs),
    Resolve(ResolveArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = DEFAULT_CACHE_ROOT)]
    pub cache_root: PathBuf,

    #[arg(long, default_value = DEFAULT_DATA_ROOT)]
    pub data_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = DEFAULT_CACHE_ROOT)]
    pub cache_root: PathBuf,

    #[arg(long, default_value = DEFAULT_DATA_ROOT)]
    pub data_root: PathBuf,

    #[arg(long)]
    pub inventory_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub refresh_inventory: bool,

    #[arg(long, default_value_t = false)]
    pub reset: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_CHARS)]
    pub max_chunk_chars: usize,

    #[arg(long, default_value_t = DEFAULT_MIN_PARAGRAPH_CHARS)]
    pub min_paragraph_chars: usize,

    #[arg(long)]
    pub max_pages_per_doc: Option<usize>,

    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long, default_value = DEFAULT_CACHE_ROOT)]
    pub cache_root: PathBuf,

    #[arg(long, default_value = DEFAULT_DATA_ROOT)]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub query: String,

    #[arg(long, default_value_t = 5)]
    pub k: usize,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    #[arg(long, default_value_t = 120_000)]
    pub timeout_ms: u64,

    #[arg(long)]
    pub response_file: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    #[arg(long, default_value_t = false)]
    pub keep_filename_references: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long, default_value_t = false, conflicts_with = "json")]
    pub html: bool,

    #[arg(long, default_value_t = false)]
    pub show_context: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Composite identity, e.g. `data/rules.pdf:4:2:1`.
    pub identity: String,

    #[arg(long, default_value = DEFAULT_DATA_ROOT)]
    pub data_root: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = DEFAULT_CACHE_ROOT)]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

pub fn default_db_path(cache_root: &std::path::Path) -> PathBuf {
    cache_root.join(DB_FILENAME)
}

pub fn default_inventory_path(cache_root: &std::path::Path) -> PathBuf {
    cache_root.join("manifests").join("document_inventory.json")
}
