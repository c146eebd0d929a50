use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::citation::{Chunk, NavigationResolver};
use crate::model::DocumentEntry;
use crate::semantic::{EmbeddingFunction, EmbeddingModelConfig};
use crate::store::{self, InsertOutcome, ResetOutcome};
use crate::util::ensure_directory;

pub struct Session {
    connection: Connection,
    embedder: EmbeddingFunction,
    navigation: NavigationResolver,
}

impl Session {
    pub fn open(db_path: &Path, data_root: &Path, model_id: &str) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }

        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        store::configure_connection(&connection)?;
        store::ensure_schema(&connection)?;

        let session = Self::with_connection(connection, data_root, model_id);
        session.record_embedding_model()?;
        info!(
            path = %db_path.display(),
            model_id = %session.embedder.config().model_id,
            "opened index store"
        );
        Ok(session)
    }

    /// Query-side session. Never writes, so it reads the last committed state
    /// while an ingest transaction is open on the same file.
    pub fn open_read_only(db_path: &Path, data_root: &Path, model_id: &str) -> Result<Self> {
        let connection = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open database read-only: {}", db_path.display()))?;

        let session = Self::with_connection(connection, data_root, model_id);
        let stored_model_id = store::get_metadata(&session.connection, "embedding_model_id")
            .ok()
            .flatten()
            .filter(|stored| *stored != session.embedder.config().model_id);
        if let Some(stored_model_id) = stored_model_id {
            warn!(
                stored = %stored_model_id,
                requested = %session.embedder.config().model_id,
                "index was built with a different embedding model"
            );
        }
        info!(
            path = %db_path.display(),
            model_id = %session.embedder.config().model_id,
            "opened index store read-only"
        );
        Ok(session)
    }

    pub fn open_in_memory(data_root: &Path, model_id: &str) -> Result<Self> {
        let connection = Connection::open_in_memory().context("failed to open in-memory sqlite")?;
        store::ensure_schema(&connection)?;
        let session = Self::with_connection(connection, data_root, model_id);
        session.record_embedding_model()?;
        Ok(session)
    }

    fn with_connection(connection: Connection, data_root: &Path, model_id: &str) -> Self {
        Self {
            connection,
            embedder: EmbeddingFunction::new(EmbeddingModelConfig::resolve(model_id)),
            navigation: NavigationResolver::new(PathBuf::from(data_root)),
        }
    }

    fn record_embedding_model(&self) -> Result<()> {
        store::set_metadata(
            &self.connection,
            "embedding_model_id",
            &self.embedder.config().model_id,
        )
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn embedder(&self) -> &EmbeddingFunction {
        &self.embedder
    }

    pub fn navigation(&self) -> &NavigationResolver {
        &self.navigation
    }

    pub fn register_documents(&mut self, documents: &[(String, DocumentEntry)]) -> Result<usize> {
        store::upsert_docs(&mut self.connection, documents)
    }

    pub fn store_chunks(&mut self, chunks: &[Chunk]) -> Result<InsertOutcome> {
        store::insert_new_chunks(&mut self.connection, chunks, &self.embedder)
    }

    pub fn reset(&mut self) -> Result<ResetOutcome> {
        store::reset_store(&mut self.connection)
    }

    pub fn count_documents(&self) -> Result<i64> {
        store::count_rows(&self.connection, "SELECT COUNT(*) FROM docs")
    }

    pub fn count_chunks(&self) -> Result<i64> {
        store::count_rows(&self.connection, "SELECT COUNT(*) FROM chunks")
    }
}
