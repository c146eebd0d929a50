use std::collections::HashSet;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::debug;

use crate::citation::Chunk;
use crate::model::DocumentEntry;
use crate::semantic::{EmbeddingFunction, encode_embedding_blob, text_hash};
use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetOutcome {
    pub docs_removed: usize,
    pub chunks_removed: usize,
}

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS docs (
              doc_id TEXT PRIMARY KEY,
              filename TEXT NOT NULL,
              kind TEXT NOT NULL,
              size_bytes INTEGER NOT NULL,
              sha256 TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
              chunk_id TEXT PRIMARY KEY,
              doc_id TEXT NOT NULL,
              page_number INTEGER NOT NULL,
              paragraph_number INTEGER NOT NULL,
              chunk_index INTEGER NOT NULL,
              text TEXT NOT NULL,
              text_hash TEXT NOT NULL,
              model_id TEXT NOT NULL,
              embedding BLOB NOT NULL,
              embedding_dim INTEGER NOT NULL,
              ingested_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_doc_id ON chunks(doc_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_model_id ON chunks(model_id);
            ",
        )
        .context("failed to create sqlite schema")?;

    set_metadata(connection, "db_schema_version", DB_SCHEMA_VERSION)?;
    Ok(())
}

pub fn set_metadata(connection: &Connection, key: &str, value: &str) -> Result<()> {
    connection
        .execute(
            "
            INSERT INTO metadata(key, value) VALUES(?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            ",
            params![key, value],
        )
        .with_context(|| format!("failed to write metadata key {key}"))?;
    Ok(())
}

pub fn get_metadata(connection: &Connection, key: &str) -> Result<Option<String>> {
    connection
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("failed to read metadata key {key}"))
}

pub fn upsert_docs(
    connection: &mut Connection,
    documents: &[(String, DocumentEntry)],
) -> Result<usize> {
    let tx = connection.transaction()?;
    {
        let mut statement = tx.prepare(
            "
            INSERT INTO docs(doc_id, filename, kind, size_bytes, sha256)
            VALUES(?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(doc_id) DO UPDATE SET
              filename=excluded.filename,
              kind=excluded.kind,
              size_bytes=excluded.size_bytes,
              sha256=excluded.sha256
            ",
        )?;

        for (doc_id, entry) in documents {
            statement.execute(params![
                doc_id,
                &entry.filename,
                entry.kind.as_str(),
                entry.size_bytes as i64,
                &entry.sha256,
            ])?;
        }
    }
    tx.commit()?;
    Ok(documents.len())
}

/// Inserts the chunks whose identity is not stored yet. The existing identity
/// set is read inside the same transaction as the inserts, and duplicates
/// within `chunks` count as skipped. Only new chunks are embedded.
pub fn insert_new_chunks(
    connection: &mut Connection,
    chunks: &[Chunk],
    embedder: &EmbeddingFunction,
) -> Result<InsertOutcome> {
    let tx = connection.transaction()?;
    let mut known = existing_chunk_ids(&tx)?;
    let mut outcome = InsertOutcome::default();
    let ingested_at = now_utc_string();
    let model_id = embedder.config().model_id.clone();

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO chunks(
              chunk_id, doc_id, page_number, paragraph_number, chunk_index,
              text, text_hash, model_id, embedding, embedding_dim, ingested_at
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(chunk_id) DO NOTHING
            ",
        )?;

        for chunk in chunks {
            let chunk_id = chunk.id();
            if !known.insert(chunk_id.clone()) {
                outcome.skipped += 1;
                continue;
            }

            let embedding = embedder.embed(&chunk.text);
            let changed = statement.execute(params![
                chunk_id,
                &chunk.identity.document_id,
                chunk.identity.page_number,
                chunk.identity.paragraph_number,
                chunk.identity.chunk_index,
                &chunk.text,
                text_hash(&chunk.text),
                &model_id,
                encode_embedding_blob(&embedding),
                embedding.len() as i64,
                &ingested_at,
            ])?;
            if changed == 0 {
                outcome.skipped += 1;
            } else {
                outcome.inserted += 1;
            }
        }
    }

    tx.commit().context("failed to commit chunk insert transaction")?;
    debug!(
        inserted = outcome.inserted,
        skipped = outcome.skipped,
        "stored chunk batch"
    );
    Ok(outcome)
}

pub fn reset_store(connection: &mut Connection) -> Result<ResetOutcome> {
    let tx = connection.transaction()?;
    let chunks_removed = tx
        .execute("DELETE FROM chunks", [])
        .context("failed to clear chunks")?;
    let docs_removed = tx
        .execute("DELETE FROM docs", [])
        .context("failed to clear docs")?;
    tx.commit()?;

    Ok(ResetOutcome {
        docs_removed,
        chunks_removed,
    })
}

pub fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed to count rows: {sql}"))?;
    Ok(count)
}

fn existing_chunk_ids(tx: &Transaction<'_>) -> Result<HashSet<String>> {
    let mut statement = tx.prepare("SELECT chunk_id FROM chunks")?;
    let ids = statement
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<HashSet<String>>>()
        .context("failed to load existing chunk identities")?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::ChunkIdentity;
    use crate::model::DocumentKind;
    use crate::semantic::{EmbeddingModelConfig, DEFAULT_MODEL_ID};

    fn connection() -> Connection {
        let connection = Connection::open_in_memory().expect("in-memory sqlite");
        ensure_schema(&connection).expect("schema");
        connection
    }

    fn embedder() -> EmbeddingFunction {
        EmbeddingFunction::new(EmbeddingModelConfig::resolve(DEFAULT_MODEL_ID))
    }

    fn chunk(paragraph: u32, index: u32, text: &str) -> Chunk {
        Chunk {
            identity: ChunkIdentity::new("data/rules.pdf", 1, paragraph, index),
            text: text.to_string(),
        }
    }

    #[test]
    fn ensure_schema_records_version_and_is_repeatable() {
        let connection = connection();
        ensure_schema(&connection).expect("second schema pass");

        assert_eq!(
            get_metadata(&connection, "db_schema_version").expect("metadata"),
            Some(DB_SCHEMA_VERSION.to_string())
        );
        assert_eq!(get_metadata(&connection, "missing").expect("metadata"), None);
    }

    #[test]
    fn insert_new_chunks_skips_identities_already_stored() {
        let mut connection = connection();
        let embedder = embedder();
        let chunks = vec![
            chunk(1, 1, "Each player starts with fifteen hundred dollars."),
            chunk(2, 1, "Doubles let the player roll again."),
        ];

        let first = insert_new_chunks(&mut connection, &chunks, &embedder).expect("first insert");
        assert_eq!(first, InsertOutcome { inserted: 2, skipped: 0 });

        let second = insert_new_chunks(&mut connection, &chunks, &embedder).expect("second insert");
        assert_eq!(second, InsertOutcome { inserted: 0, skipped: 2 });

        assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM chunks").expect("count"), 2);
    }

    #[test]
    fn insert_new_chunks_counts_duplicates_within_one_batch() {
        let mut connection = connection();
        let chunks = vec![
            chunk(1, 1, "Same identity twice in one pass."),
            chunk(1, 1, "Same identity twice in one pass."),
            chunk(1, 2, "A different chunk of the paragraph."),
        ];

        let outcome = insert_new_chunks(&mut connection, &chunks, &embedder()).expect("insert");
        assert_eq!(outcome, InsertOutcome { inserted: 2, skipped: 1 });
    }

    #[test]
    fn stored_chunk_keeps_identity_columns_and_embedding_width() {
        let mut connection = connection();
        insert_new_chunks(
            &mut connection,
            &[chunk(3, 2, "Stored text for the third paragraph.")],
            &embedder(),
        )
        .expect("insert");

        let (doc_id, paragraph, index, dim, model_id): (String, u32, u32, i64, String) = connection
            .query_row(
                "SELECT doc_id, paragraph_number, chunk_index, embedding_dim, model_id FROM chunks WHERE chunk_id = ?1",
                ["data/rules.pdf:1:3:2"],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .expect("row");

        assert_eq!(doc_id, "data/rules.pdf");
        assert_eq!((paragraph, index), (3, 2));
        assert_eq!(dim, 384);
        assert_eq!(model_id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn reset_store_clears_docs_and_chunks() {
        let mut connection = connection();
        let entry = DocumentEntry {
            filename: "rules.pdf".to_string(),
            kind: DocumentKind::Pdf,
            size_bytes: 10,
            sha256: "abc".to_string(),
        };
        upsert_docs(&mut connection, &[("data/rules.pdf".to_string(), entry)]).expect("docs");
        insert_new_chunks(&mut connection, &[chunk(1, 1, "Some stored chunk text.")], &embedder())
            .expect("insert");

        let outcome = reset_store(&mut connection).expect("reset");

        assert_eq!(outcome, ResetOutcome { docs_removed: 1, chunks_removed: 1 });
        assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM docs").expect("count"), 0);
    }
}
