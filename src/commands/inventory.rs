use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::{InventoryArgs, default_inventory_path};
use crate::model::{DocumentEntry, DocumentInventoryManifest, DocumentKind};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.data_root)?;

    if args.dry_run {
        info!(
            document_count = manifest.document_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| default_inventory_path(&args.cache_root));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(document_count = manifest.document_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(data_root: &Path) -> Result<DocumentInventoryManifest> {
    let mut document_paths = discover_documents(data_root)?;
    document_paths.sort_by(|left, right| left.0.cmp(&right.0));

    if document_paths.is_empty() {
        bail!("no PDF or text documents found in {}", data_root.display());
    }

    let mut documents = Vec::with_capacity(document_paths.len());
    for (path, kind) in document_paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
        let size_bytes = fs::metadata(&path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();

        documents.push(DocumentEntry {
            filename,
            kind,
            size_bytes,
            sha256: sha256_file(&path)?,
        });
    }

    Ok(DocumentInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: data_root.display().to_string(),
        document_count: documents.len(),
        documents,
    })
}

fn discover_documents(data_root: &Path) -> Result<Vec<(PathBuf, DocumentKind)>> {
    let mut documents = Vec::new();

    let entries = fs::read_dir(data_root)
        .with_context(|| format!("failed to read {}", data_root.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", data_root.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let kind = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(DocumentKind::from_extension);

        if let Some(kind) = kind {
            documents.push((path, kind));
        }
    }

    Ok(documents)
}
