use super::*;

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let inventory_manifest_path = args
        .inventory_manifest_path
        .clone()
        .unwrap_or_else(|| default_inventory_path(&cache_root));
    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("ingest_run_{}.json", utc_compact_string(started_ts)))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&cache_root));

    info!(
        data_root = %args.data_root.display(),
        run_id = %run_id,
        reset = args.reset,
        "starting ingest"
    );

    let inventory = load_or_refresh_inventory(
        &args.data_root,
        &inventory_manifest_path,
        args.refresh_inventory,
    )?;
    let tool_versions = ToolVersions {
        pdftotext: pdftotext_version(),
    };

    let mut session = Session::open(&db_path, &args.data_root, &args.model_id)?;

    let mut counts = IngestCounts {
        document_count: inventory.document_count,
        ..IngestCounts::default()
    };
    if args.reset {
        let outcome = session.reset()?;
        info!(
            docs = outcome.docs_removed,
            chunks = outcome.chunks_removed,
            "cleared index store"
        );
        counts.chunks_removed_by_reset = outcome.chunks_removed;
    }

    let documents = inventory
        .documents
        .iter()
        .map(|entry| (document_id_for(&args.data_root, &entry.filename), entry.clone()))
        .collect::<Vec<(String, DocumentEntry)>>();
    session.register_documents(&documents)?;

    let segmenter = ParagraphSegmenter::new(SegmenterConfig {
        max_chunk_chars: args.max_chunk_chars,
        min_paragraph_chars: args.min_paragraph_chars,
    })?;
    let pass = segment_documents(&documents, &segmenter, |entry| {
        extract_pages(
            &args.data_root.join(&entry.filename),
            entry.kind,
            args.max_pages_per_doc,
        )
    });

    // One transaction for the whole pass keeps duplicate detection consistent.
    let outcome = session.store_chunks(&pass.chunks)?;

    counts.processed_document_count = pass.processed_document_count;
    counts.page_count = pass.page_count;
    counts.empty_page_count = pass.empty_page_count;
    counts.chunks_segmented = pass.chunks.len();
    counts.chunks_inserted = outcome.inserted;
    counts.chunks_skipped = outcome.skipped;
    counts.docs_total = session.count_documents()?;
    counts.chunks_total = session.count_chunks()?;

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_ingest_command(&args),
        reset: args.reset,
        tool_versions,
        paths: IngestPaths {
            cache_root: cache_root.display().to_string(),
            data_root: args.data_root.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        settings: SegmenterSettings {
            max_chunk_chars: args.max_chunk_chars,
            min_paragraph_chars: args.min_paragraph_chars,
            embedding_model_id: session.embedder().config().model_id.clone(),
        },
        counts,
        source_hashes: inventory.documents,
        warnings: pass.warnings,
    };

    write_json_pretty(&ingest_manifest_path, &manifest)?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(
        new = manifest.counts.chunks_inserted,
        skipped = manifest.counts.chunks_skipped,
        chunks = manifest.counts.chunks_total,
        "ingest completed"
    );

    Ok(())
}

#[derive(Debug, Default)]
pub(super) struct SegmentationPass {
    pub(super) chunks: Vec<Chunk>,
    pub(super) processed_document_count: usize,
    pub(super) page_count: usize,
    pub(super) empty_page_count: usize,
    pub(super) warnings: Vec<String>,
}

pub(super) fn segment_documents<F>(
    documents: &[(String, DocumentEntry)],
    segmenter: &ParagraphSegmenter,
    mut extract: F,
) -> SegmentationPass
where
    F: FnMut(&DocumentEntry) -> Result<Vec<String>>,
{
    let mut pass = SegmentationPass::default();

    for (document_id, entry) in documents {
        let pages = match extract(entry) {
            Ok(pages) => pages,
            Err(err) => {
                warn!(document = %document_id, error = %err, "skipping document");
                pass.warnings
                    .push(format!("{document_id}: extraction failed: {err:#}"));
                continue;
            }
        };

        let chunks = segmenter.segment_document(document_id, &pages);
        pass.processed_document_count += 1;
        pass.page_count += pages.len();
        pass.empty_page_count += pages.iter().filter(|page| page.trim().is_empty()).count();
        info!(
            document = %document_id,
            pages = pages.len(),
            chunks = chunks.len(),
            "segmented document"
        );
        pass.chunks.extend(chunks);
    }

    pass
}

pub(super) fn document_id_for(data_root: &Path, filename: &str) -> String {
    let root = data_root.display().to_string();
    let root = root.trim_end_matches(['/', '\\']);
    if root.is_empty() {
        filename.to_string()
    } else {
        format!("{root}/{filename}")
    }
}

fn load_or_refresh_inventory(
    data_root: &Path,
    inventory_manifest_path: &Path,
    refresh_inventory: bool,
) -> Result<DocumentInventoryManifest> {
    if refresh_inventory || !inventory_manifest_path.exists() {
        let manifest = inventory::build_manifest(data_root)?;
        write_json_pretty(inventory_manifest_path, &manifest)?;
        info!(
            path = %inventory_manifest_path.display(),
            document_count = manifest.document_count,
            "refreshed inventory manifest"
        );
        return Ok(manifest);
    }

    let manifest: DocumentInventoryManifest = read_json(inventory_manifest_path)?;
    info!(
        path = %inventory_manifest_path.display(),
        document_count = manifest.document_count,
        "loaded existing inventory manifest"
    );
    Ok(manifest)
}

pub(super) fn render_ingest_command(args: &IngestArgs) -> String {
    let mut command = vec![
        "ragcite".to_string(),
        "ingest".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
        "--data-root".to_string(),
        args.data_root.display().to_string(),
    ];

    let optional_paths: [(&str, &Option<PathBuf>); 3] = [
        ("--inventory-manifest-path", &args.inventory_manifest_path),
        ("--ingest-manifest-path", &args.ingest_manifest_path),
        ("--db-path", &args.db_path),
    ];
    for (flag, path) in optional_paths {
        if let Some(path) = path {
            command.push(flag.to_string());
            command.push(path.display().to_string());
        }
    }
    if args.refresh_inventory {
        command.push("--refresh-inventory".to_string());
    }
    if args.reset {
        command.push("--reset".to_string());
    }
    command.push("--max-chunk-chars".to_string());
    command.push(args.max_chunk_chars.to_string());
    command.push("--min-paragraph-chars".to_string());
    command.push(args.min_paragraph_chars.to_string());
    if let Some(max_pages) = args.max_pages_per_doc {
        command.push("--max-pages-per-doc".to_string());
        command.push(max_pages.to_string());
    }
    command.push("--model-id".to_string());
    command.push(args.model_id.clone());

    command.join(" ")
}
