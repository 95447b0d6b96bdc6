//! SQLite persistence for [`FlatIndex`].

use super::{EmbeddingModel, FlatIndex, IndexEntry};
use askwell_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// File name of the index artifact inside an index directory.
pub const INDEX_FILE: &str = "index.sqlite";

const PARTIAL_SUFFIX: &str = ".partial";
const SCHEMA_VERSION: &str = "1";

const SCHEMA: &str = r#"
CREATE TABLE index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE entries (
    ordinal INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    position INTEGER NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    metadata TEXT NOT NULL
);

CREATE INDEX idx_entries_source ON entries(source);
"#;

fn persistence(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Persistence(format!("{}: {}", context, e))
}

/// Write `index` to `<dir>/index.sqlite`.
///
/// Rows go to a `.partial` file first, which is renamed over the final name
/// only after the transaction commits.
pub(super) fn write(index: &FlatIndex, dir: &Path) -> AppResult<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| persistence(&format!("Failed to create {}", dir.display()), e))?;

    let final_path = dir.join(INDEX_FILE);
    let partial_path = dir.join(format!("{}{}", INDEX_FILE, PARTIAL_SUFFIX));

    if partial_path.exists() {
        std::fs::remove_file(&partial_path)
            .map_err(|e| persistence("Failed to remove stale partial index", e))?;
    }

    if let Err(e) = write_rows(index, &partial_path) {
        let _ = std::fs::remove_file(&partial_path);
        return Err(e);
    }

    std::fs::rename(&partial_path, &final_path)
        .map_err(|e| persistence("Failed to move index into place", e))?;

    tracing::debug!(
        "Persisted {} entries to {}",
        index.entries.len(),
        final_path.display()
    );
    Ok(final_path)
}

fn write_rows(index: &FlatIndex, path: &Path) -> AppResult<()> {
    let mut conn =
        Connection::open(path).map_err(|e| persistence("Failed to open SQLite index", e))?;

    conn.execute_batch(SCHEMA)
        .map_err(|e| persistence("Failed to create tables", e))?;

    let tx = conn
        .transaction()
        .map_err(|e| persistence("Failed to begin transaction", e))?;

    {
        let mut meta = tx
            .prepare("INSERT INTO index_meta (key, value) VALUES (?1, ?2)")
            .map_err(|e| persistence("Failed to prepare metadata insert", e))?;
        let dimensions = index.dimensions.to_string();
        let created_at = index.created_at.to_rfc3339();
        for (key, value) in [
            ("schema_version", SCHEMA_VERSION),
            ("dimensions", dimensions.as_str()),
            ("embedding_provider", index.embedding.provider.as_str()),
            ("embedding_model", index.embedding.model.as_str()),
            ("created_at", created_at.as_str()),
        ] {
            meta.execute(params![key, value])
                .map_err(|e| persistence("Failed to write index metadata", e))?;
        }

        let mut insert = tx
            .prepare(
                "INSERT INTO entries (ordinal, id, source, position, text, embedding, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(|e| persistence("Failed to prepare entry insert", e))?;

        for (ordinal, entry) in index.entries.iter().enumerate() {
            let metadata = serde_json::to_string(&entry.metadata)
                .map_err(|e| persistence("Failed to serialize metadata", e))?;
            insert
                .execute(params![
                    ordinal as i64,
                    entry.id,
                    entry.source,
                    entry.position as i64,
                    entry.text,
                    embedding_to_bytes(&entry.embedding),
                    metadata,
                ])
                .map_err(|e| persistence("Failed to insert entry", e))?;
        }
    }

    tx.commit()
        .map_err(|e| persistence("Failed to commit index", e))?;
    conn.close()
        .map_err(|(_, e)| persistence("Failed to close SQLite index", e))?;
    Ok(())
}

/// Read `<dir>/index.sqlite`.
pub(super) fn read(dir: &Path) -> AppResult<FlatIndex> {
    let path = dir.join(INDEX_FILE);
    if !path.exists() {
        return Err(AppError::Index(format!(
            "No index found at {}. Run 'askwell ingest' first.",
            dir.display()
        )));
    }

    let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| AppError::Index(format!("Failed to open SQLite index: {}", e)))?;

    let meta = |key: &str| -> AppResult<String> {
        conn.query_row(
            "SELECT value FROM index_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Index(format!("Index metadata '{}' unreadable: {}", key, e)))
    };

    let version = meta("schema_version")?;
    if version != SCHEMA_VERSION {
        return Err(AppError::Index(format!(
            "Unsupported index schema version {} (expected {})",
            version, SCHEMA_VERSION
        )));
    }

    let dimensions: usize = meta("dimensions")?
        .parse()
        .map_err(|e| AppError::Index(format!("Invalid dimensions in index metadata: {}", e)))?;
    let embedding = EmbeddingModel::new(meta("embedding_provider")?, meta("embedding_model")?);
    let created_at = DateTime::parse_from_rfc3339(&meta("created_at")?)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Index(format!("Invalid created_at in index metadata: {}", e)))?;

    let mut stmt = conn
        .prepare(
            "SELECT id, source, position, text, embedding, metadata
             FROM entries ORDER BY ordinal",
        )
        .map_err(|e| AppError::Index(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Vec<u8>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .map_err(|e| AppError::Index(format!("Failed to query entries: {}", e)))?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, source, position, text, blob, metadata) =
            row.map_err(|e| AppError::Index(format!("Failed to read entry: {}", e)))?;

        let embedding = bytes_to_embedding(&blob)?;
        if embedding.len() != dimensions {
            return Err(AppError::Index(format!(
                "Entry '{}' has {} dimensions, index declares {}",
                id,
                embedding.len(),
                dimensions
            )));
        }

        entries.push(IndexEntry {
            id,
            text,
            source,
            position: position as u32,
            metadata: serde_json::from_str(&metadata)?,
            embedding,
        });
    }

    tracing::debug!("Loaded {} entries from {}", entries.len(), path.display());

    Ok(FlatIndex {
        dimensions,
        embedding,
        created_at,
        entries,
    })
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Index(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
