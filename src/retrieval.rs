use std::cmp::Ordering;

use anyhow::{Context, Result};
use rusqlite::params;
use tracing::debug;

use crate::citation::{ChunkIdentity, RetrievedChunk};
use crate::semantic::{cosine_similarity, decode_embedding_blob};
use crate::session::Session;

pub trait Retriever {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

pub struct VectorRetriever<'a> {
    session: &'a Session,
}

impl<'a> VectorRetriever<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }
}

struct ScoredChunk {
    distance: f64,
    identity: Option<ChunkIdentity>,
    chunk_id: String,
    text: String,
}

impl Retriever for VectorRetriever<'_> {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedder = self.session.embedder();
        let query_embedding = embedder.embed(query);
        let dimensions = embedder.dimensions();

        let mut statement = self
            .session
            .connection()
            .prepare(
                "
                SELECT chunk_id, text, embedding, embedding_dim
                FROM chunks
                WHERE model_id = ?1
                ",
            )
            .context("failed to prepare vector scan")?;
        let mut rows = statement.query(params![&embedder.config().model_id])?;

        let mut scored = Vec::<ScoredChunk>::new();
        let mut scanned = 0usize;
        while let Some(row) = rows.next()? {
            scanned += 1;
            if row.get::<_, i64>(3)? as usize != dimensions {
                continue;
            }
            let blob = row.get::<_, Vec<u8>>(2)?;
            let Some(embedding) = decode_embedding_blob(&blob, dimensions) else {
                continue;
            };

            let chunk_id = row.get::<_, String>(0)?;
            scored.push(ScoredChunk {
                distance: 1.0 - cosine_similarity(&query_embedding, &embedding),
                identity: ChunkIdentity::parse(&chunk_id),
                chunk_id,
                text: row.get(1)?,
            });
        }

        sort_by_distance(&mut scored);
        scored.truncate(k);
        debug!(scanned, returned = scored.len(), "vector scan complete");

        Ok(scored
            .into_iter()
            .map(|candidate| RetrievedChunk {
                content: candidate.text,
                id: Some(candidate.chunk_id),
                distance: Some(candidate.distance),
            })
            .collect())
    }
}

// Ties fall back to reading order of the identities.
fn sort_by_distance(candidates: &mut [ScoredChunk]) {
    candidates.sort_by(|left, right| {
        left.distance
            .total_cmp(&right.distance)
            .then_with(|| match (&left.identity, &right.identity) {
                (Some(left_id), Some(right_id)) => left_id.cmp(right_id),
                _ => Ordering::Equal,
            })
            .then_with(|| left.chunk_id.cmp(&right.chunk_id))
    });
}
