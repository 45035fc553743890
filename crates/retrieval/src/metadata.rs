//! Metadata stores used to hydrate search hits.
//!
//! Every store answers a whole batch of identifiers in one call. Identifiers without a row
//! are simply absent from the returned map; that is not an error.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fxhash::FxHashMap;
use rusqlite::{Connection, OpenFlags, Row};
use tracing::debug;

use crate::error::UpstreamError;
use crate::types::{DocumentId, DocumentMetadata};

pub type MetadataMap = FxHashMap<DocumentId, DocumentMetadata>;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Looks up all `ids` in a single round trip.
    async fn lookup(&self, ids: &[DocumentId]) -> Result<MetadataMap, UpstreamError>;
}

/// Store backed by a map, for tests and small fixed corpora.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    records: FxHashMap<DocumentId, DocumentMetadata>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: DocumentId, metadata: DocumentMetadata) {
        self.records.insert(id, metadata);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<(DocumentId, DocumentMetadata)> for InMemoryMetadataStore {
    fn from_iter<I: IntoIterator<Item = (DocumentId, DocumentMetadata)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn lookup(&self, ids: &[DocumentId]) -> Result<MetadataMap, UpstreamError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|m| (*id, m.clone())))
            .collect())
    }
}

/// Read-only SQLite store. The table needs `id`, `title`, `authors`, `abstract` and
/// `publication_year` columns.
///
/// Each lookup opens its own read-only connection on the blocking pool, so concurrent
/// requests read the file in parallel.
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    table: String,
    path: PathBuf,
}

impl SqliteMetadataStore {
    /// Checks the table name and that the file opens; no connection is kept.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, UpstreamError> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(UpstreamError::Local(format!(
                "table name {table:?} is not a plain identifier"
            )));
        }
        let path = path.as_ref().to_path_buf();
        Self::connect(&path)?;
        Ok(Self {
            table: table.to_string(),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(path: &Path) -> Result<Connection, UpstreamError> {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| UpstreamError::Unreachable(format!("{}: {e}", path.display())))
    }

    fn lookup_blocking(
        conn: &Connection,
        table: &str,
        ids: &[DocumentId],
    ) -> rusqlite::Result<MetadataMap> {
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT id, title, authors, abstract, publication_year
             FROM {table} WHERE id IN ({})",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::types::ToSql> = ids
            .iter()
            .map(|id| id as &dyn rusqlite::types::ToSql)
            .collect();
        let rows = stmt
            .query_map(params.as_slice(), map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().collect())
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<(DocumentId, DocumentMetadata)> {
    Ok((
        row.get(0)?,
        DocumentMetadata {
            title: row.get(1)?,
            authors: row.get(2)?,
            abstract_text: row.get(3)?,
            publication_year: row.get(4)?,
        },
    ))
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn lookup(&self, ids: &[DocumentId]) -> Result<MetadataMap, UpstreamError> {
        if ids.is_empty() {
            return Ok(MetadataMap::default());
        }
        let path = self.path.clone();
        let table = self.table.clone();
        let ids = ids.to_vec();

        let found = tokio::task::spawn_blocking(move || {
            let conn = Self::connect(&path)?;
            Self::lookup_blocking(&conn, &table, &ids)
                .map_err(|e| UpstreamError::Local(format!("sqlite: {e}")))
        })
        .await
        .map_err(|e| UpstreamError::Local(format!("lookup task failed: {e}")))??;

        debug!(found = found.len(), "sqlite metadata lookup");
        Ok(found)
    }
}
