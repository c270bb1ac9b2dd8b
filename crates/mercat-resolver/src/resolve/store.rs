use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use ulid::Ulid;

use crate::resolve::vector::{decode_embedding, encode_embedding};
use crate::state::map_sqlite_error;
use crate::{ResolverError, ResolverResult};

/// A canonical merchant entity.
///
/// `display_name` holds the normalized form and is unique in the store
/// (case-insensitive). `aliases` collects raw surface forms known to
/// resolve here; it only grows. The embedding is optional until generated
/// and the merchant's identity never depends on it.
#[derive(Debug, Clone, Serialize)]
pub struct Merchant {
    pub merchant_id: String,
    pub display_name: String,
    pub category: Option<String>,
    pub aliases: Vec<String>,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: String,
    pub updated_at: String,
}

impl Merchant {
    pub(crate) fn new(display_name: &str, category: Option<&str>, first_alias: &str) -> Self {
        let timestamp = now_timestamp();
        Self {
            merchant_id: format!("mer_{}", Ulid::new()),
            display_name: display_name.to_string(),
            category: category.map(str::to_string),
            aliases: vec![first_alias.to_string()],
            embedding: None,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        }
    }

    pub fn has_alias(&self, candidate: &str) -> bool {
        self.aliases
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(candidate))
    }
}

pub(crate) fn find_by_exact_name(
    connection: &Connection,
    db_path: &Path,
    name: &str,
) -> ResolverResult<Option<Merchant>> {
    let mut statement = connection
        .prepare(
            "SELECT merchant_id, display_name, category, aliases, embedding,
                    created_at, updated_at
             FROM merchants
             WHERE display_name = ?1 COLLATE NOCASE
             LIMIT 1",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let row = statement
        .query_row(params![name], merchant_from_row)
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    row.map(|raw| finish_merchant(raw, db_path)).transpose()
}

pub(crate) fn find_by_id(
    connection: &Connection,
    db_path: &Path,
    merchant_id: &str,
) -> ResolverResult<Option<Merchant>> {
    let mut statement = connection
        .prepare(
            "SELECT merchant_id, display_name, category, aliases, embedding,
                    created_at, updated_at
             FROM merchants
             WHERE merchant_id = ?1
             LIMIT 1",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let row = statement
        .query_row(params![merchant_id], merchant_from_row)
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    row.map(|raw| finish_merchant(raw, db_path)).transpose()
}

/// Every merchant, in stable store order (creation order, id tie-break).
/// Fuzzy and embedding tie-breaks depend on this order being deterministic.
pub(crate) fn list_all(connection: &Connection, db_path: &Path) -> ResolverResult<Vec<Merchant>> {
    let mut statement = connection
        .prepare(
            "SELECT merchant_id, display_name, category, aliases, embedding,
                    created_at, updated_at
             FROM merchants
             ORDER BY created_at ASC, merchant_id ASC",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let rows_iter = statement
        .query_map([], merchant_from_row)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut merchants: Vec<Merchant> = Vec::new();
    for row in rows_iter {
        let raw = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        merchants.push(finish_merchant(raw, db_path)?);
    }

    Ok(merchants)
}

pub(crate) fn find_by_alias(
    connection: &Connection,
    db_path: &Path,
    name: &str,
) -> ResolverResult<Option<Merchant>> {
    // Aliases live in a JSON text column, so the scan happens in Rust.
    // The fuzzy tier walks the whole table anyway; this is no worse.
    let merchants = list_all(connection, db_path)?;
    Ok(merchants
        .into_iter()
        .find(|merchant| merchant.has_alias(name)))
}

pub(crate) fn list_missing_embeddings(
    connection: &Connection,
    db_path: &Path,
    limit: usize,
) -> ResolverResult<Vec<Merchant>> {
    let mut statement = connection
        .prepare(
            "SELECT merchant_id, display_name, category, aliases, embedding,
                    created_at, updated_at
             FROM merchants
             WHERE embedding IS NULL
             ORDER BY created_at ASC, merchant_id ASC
             LIMIT ?1",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let rows_iter = statement
        .query_map(params![limit as i64], merchant_from_row)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut merchants: Vec<Merchant> = Vec::new();
    for row in rows_iter {
        let raw = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        merchants.push(finish_merchant(raw, db_path)?);
    }

    Ok(merchants)
}

/// Outcome of a merchant insert. A display-name conflict is not an error:
/// it means a concurrent creation won the race and the caller should
/// re-run the lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertOutcome {
    Inserted,
    DisplayNameConflict,
}

pub(crate) fn insert(
    connection: &Connection,
    db_path: &Path,
    merchant: &Merchant,
) -> ResolverResult<InsertOutcome> {
    let aliases_json = encode_aliases(&merchant.aliases, db_path)?;
    let embedding_blob = merchant.embedding.as_deref().map(encode_embedding);

    let inserted = connection.execute(
        "INSERT INTO merchants (
            merchant_id,
            display_name,
            category,
            aliases,
            embedding,
            created_at,
            updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &merchant.merchant_id,
            &merchant.display_name,
            &merchant.category,
            &aliases_json,
            &embedding_blob,
            &merchant.created_at,
            &merchant.updated_at
        ],
    );

    match inserted {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(error) if crate::state::is_constraint_violation(&error) => {
            Ok(InsertOutcome::DisplayNameConflict)
        }
        Err(error) => Err(map_sqlite_error(db_path, &error)),
    }
}

pub(crate) fn update_embedding(
    connection: &Connection,
    db_path: &Path,
    merchant_id: &str,
    embedding: &[f32],
) -> ResolverResult<()> {
    connection
        .execute(
            "UPDATE merchants
             SET embedding = ?1, updated_at = ?2
             WHERE merchant_id = ?3",
            params![encode_embedding(embedding), now_timestamp(), merchant_id],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(())
}

/// Append a raw surface form to a merchant's alias list. Aliases never
/// shrink; an already-known alias (case-insensitive) is a no-op.
pub(crate) fn add_alias(
    connection: &Connection,
    db_path: &Path,
    merchant: &Merchant,
    alias: &str,
) -> ResolverResult<Merchant> {
    let alias = alias.trim();
    if alias.is_empty() || merchant.has_alias(alias) {
        return Ok(merchant.clone());
    }

    let mut updated = merchant.clone();
    updated.aliases.push(alias.to_string());
    updated.updated_at = now_timestamp();

    connection
        .execute(
            "UPDATE merchants
             SET aliases = ?1, updated_at = ?2
             WHERE merchant_id = ?3",
            params![
                encode_aliases(&updated.aliases, db_path)?,
                &updated.updated_at,
                &updated.merchant_id
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    Ok(updated)
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

struct RawMerchant {
    merchant_id: String,
    display_name: String,
    category: Option<String>,
    aliases_json: String,
    embedding_blob: Option<Vec<u8>>,
    created_at: String,
    updated_at: String,
}

fn merchant_from_row(row: &Row<'_>) -> rusqlite::Result<RawMerchant> {
    Ok(RawMerchant {
        merchant_id: row.get(0)?,
        display_name: row.get(1)?,
        category: row.get(2)?,
        aliases_json: row.get(3)?,
        embedding_blob: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn finish_merchant(raw: RawMerchant, db_path: &Path) -> ResolverResult<Merchant> {
    let aliases: Vec<String> =
        serde_json::from_str(&raw.aliases_json).map_err(|error| ResolverError::Store {
            path: db_path.to_path_buf(),
            detail: format!("Corrupt alias list for {}: {error}", raw.merchant_id),
        })?;

    let embedding = raw
        .embedding_blob
        .as_deref()
        .map(decode_embedding)
        .transpose()?;

    Ok(Merchant {
        merchant_id: raw.merchant_id,
        display_name: raw.display_name,
        category: raw.category,
        aliases,
        embedding,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    })
}

fn encode_aliases(aliases: &[String], db_path: &Path) -> ResolverResult<String> {
    serde_json::to_string(aliases).map_err(|error| ResolverError::Store {
        path: db_path.to_path_buf(),
        detail: format!("Failed to serialize alias list: {error}"),
    })
}
