use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use tracing::debug;
use ulid::Ulid;

use crate::ResolverResult;
use crate::resolve::store::now_timestamp;
use crate::resolve::vector::{decode_embedding, encode_embedding};
use crate::state::map_sqlite_error;

/// Process-local accelerator tier in front of the persistent cache.
///
/// Purely an accelerator: dropping it loses nothing, entries expire after
/// the policy TTL, and no cross-process coherency is attempted. Memory hits
/// deliberately skip the persistent usage-count bump; only persistent hits
/// record usage.
pub(crate) struct MemoryTier {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    ttl: Duration,
}

struct MemoryEntry {
    embedding: Vec<f32>,
    expires_at: Instant,
}

impl MemoryTier {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn get(&self, text_hash: &str) -> Option<Vec<f32>> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(text_hash) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.embedding.clone()),
            Some(_) => {
                entries.remove(text_hash);
                None
            }
            None => None,
        }
    }

    fn set(&self, text_hash: &str, embedding: &[f32]) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                text_hash.to_string(),
                MemoryEntry {
                    embedding: embedding.to_vec(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }

    #[cfg(test)]
    fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Deterministic cache key: SHA-256 of the upper-cased normalized text.
pub(crate) fn text_hash(normalized_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_text.to_uppercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Look up a previously generated embedding for normalized text.
///
/// Memory tier first; on a persistent hit the row's usage stats are bumped
/// and the memory tier is backfilled. A total miss returns `None` and costs
/// nothing.
pub(crate) fn get(
    connection: &Connection,
    db_path: &Path,
    memory: &MemoryTier,
    normalized_text: &str,
) -> ResolverResult<Option<Vec<f32>>> {
    let hash = text_hash(normalized_text);

    if let Some(embedding) = memory.get(&hash) {
        debug!(text = normalized_text, "memory cache hit");
        return Ok(Some(embedding));
    }

    let blob: Option<Vec<u8>> = connection
        .query_row(
            "SELECT embedding FROM embedding_cache WHERE text_hash = ?1 LIMIT 1",
            params![&hash],
            |row| row.get(0),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let Some(blob) = blob else {
        return Ok(None);
    };

    debug!(text = normalized_text, "persistent cache hit");
    connection
        .execute(
            "UPDATE embedding_cache
             SET usage_count = usage_count + 1, last_used_at = ?1
             WHERE text_hash = ?2",
            params![now_timestamp(), &hash],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let embedding = decode_embedding(&blob)?;
    memory.set(&hash, &embedding);
    Ok(Some(embedding))
}

/// Persist a freshly generated embedding and seed the memory tier.
///
/// The upsert keeps at most one row per text hash even when two writers
/// race on the first-ever embedding of the same text.
pub(crate) fn put(
    connection: &Connection,
    db_path: &Path,
    memory: &MemoryTier,
    normalized_text: &str,
    embedding: &[f32],
) -> ResolverResult<()> {
    let hash = text_hash(normalized_text);
    let timestamp = now_timestamp();

    connection
        .execute(
            "INSERT INTO embedding_cache (
                entry_id,
                text_hash,
                normalized_text,
                embedding,
                usage_count,
                created_at,
                last_used_at
             ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
             ON CONFLICT(text_hash) DO UPDATE SET
                embedding = excluded.embedding,
                last_used_at = excluded.last_used_at",
            params![
                format!("emb_{}", Ulid::new()),
                &hash,
                normalized_text,
                encode_embedding(embedding),
                &timestamp
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    memory.set(&hash, embedding);
    debug!(text = normalized_text, "cached embedding");
    Ok(())
}

/// Out-of-band retention sweep: drop entries that are both old and rarely
/// used. A removed entry simply becomes a future cache miss, so the sweep
/// never needs to coordinate with in-flight matches.
pub(crate) fn prune(
    connection: &Connection,
    db_path: &Path,
    max_age_days: i64,
    min_usage: i64,
) -> ResolverResult<usize> {
    let cutoff = (Utc::now() - ChronoDuration::days(max_age_days))
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    let removed = connection
        .execute(
            "DELETE FROM embedding_cache
             WHERE last_used_at < ?1 AND usage_count < ?2",
            params![cutoff, min_usage],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    Ok(removed)
}
