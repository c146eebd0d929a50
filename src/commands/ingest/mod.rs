use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::citation::{Chunk, ParagraphSegmenter, SegmenterConfig};
use crate::cli::{IngestArgs, default_db_path, default_inventory_path};
use crate::commands::inventory;
use crate::model::{
    DocumentEntry, DocumentInventoryManifest, DocumentKind, IngestCounts, IngestPaths,
    IngestRunManifest, SegmenterSettings, ToolVersions,
};
use crate::session::Session;
use crate::store::DB_SCHEMA_VERSION;
use crate::util::{
    ensure_directory, now_utc_string, read_json, utc_compact_string, write_json_pretty,
};

mod extract;
mod run;

pub use run::run;

use extract::*;
use run::*;
