use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::{StatusArgs, default_db_path, default_inventory_path};
use crate::model::DocumentInventoryManifest;
use crate::store::{count_rows, get_metadata};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let inventory_path = default_inventory_path(&args.cache_root);
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root));

    info!(cache_root = %args.cache_root.display(), "status requested");

    if inventory_path.exists() {
        let inventory: DocumentInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            source = %inventory.source_directory,
            document_count = inventory.document_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    if db_path.exists() {
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let status = store_status(&conn);
        info!(
            path = %db_path.display(),
            schema_version = %status.schema_version,
            embedding_model = %status.embedding_model,
            docs = status.docs,
            chunks = status.chunks,
            "database status"
        );
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

struct StoreStatus {
    schema_version: String,
    embedding_model: String,
    docs: i64,
    chunks: i64,
}

// A store from an interrupted first run may lack tables.
fn store_status(conn: &Connection) -> StoreStatus {
    let metadata = |key: &str| {
        get_metadata(conn, key)
            .ok()
            .flatten()
            .unwrap_or_else(|| "unknown".to_string())
    };

    StoreStatus {
        schema_version: metadata("db_schema_version"),
        embedding_model: metadata("embedding_model_id"),
        docs: count_rows(conn, "SELECT COUNT(*) FROM docs").unwrap_or(0),
        chunks: count_rows(conn, "SELECT COUNT(*) FROM chunks").unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DB_SCHEMA_VERSION, ensure_schema};

    #[test]
    fn store_status_reads_counts_and_metadata() {
        let conn = Connection::open_in_memory().expect("sqlite");
        ensure_schema(&conn).expect("schema");

        let status = store_status(&conn);
        assert_eq!(status.schema_version, DB_SCHEMA_VERSION);
        assert_eq!(status.embedding_model, "unknown");
        assert_eq!((status.docs, status.chunks), (0, 0));
    }

    #[test]
    fn store_status_tolerates_missing_tables() {
        let conn = Connection::open_in_memory().expect("sqlite");

        let status = store_status(&conn);
        assert_eq!(status.schema_version, "unknown");
        assert_eq!(status.chunks, 0);
    }
}
