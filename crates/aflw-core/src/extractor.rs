//! Read-only access to the AFLW SQLite database.
//!
//! Queries are expressed as `(select, from, where)` triples and return rows
//! in source order without filtering or transformation.

use crate::types::{FaceRect, Pose};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("source database not found: {0}")]
    NotFound(String),
    #[error("cannot open source database {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("query failed ({sql}): {source}")]
    Query {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// Declarative `SELECT ... FROM ... [WHERE ...]` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec<'a> {
    pub select: &'a str,
    pub from: &'a str,
    pub filter: Option<&'a str>,
}

impl QuerySpec<'_> {
    pub fn to_sql(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.select, self.from);
        if let Some(filter) = self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        sql
    }
}

/// Geometry, pose and demographics of one face, joined across five tables.
pub const FACE_QUERY: QuerySpec<'static> = QuerySpec {
    select: "faces.face_id, imgs.filepath, rect.x, rect.y, rect.w, rect.h, \
             pose.roll, pose.pitch, pose.yaw, metadata.sex",
    from: "faces, faceimages imgs, facerect rect, facepose pose, facemetadata metadata",
    filter: Some(
        "faces.file_id = imgs.file_id and faces.face_id = rect.face_id and \
         faces.face_id = pose.face_id and faces.face_id = metadata.face_id",
    ),
};

/// Landmark coordinates. A landmark is invisible when its row is absent.
pub const LANDMARK_QUERY: QuerySpec<'static> = QuerySpec {
    select: "faces.face_id, coords.feature_id, coords.x, coords.y",
    from: "faces, featurecoords coords",
    filter: Some("faces.face_id = coords.face_id"),
};

/// One row of [`FACE_QUERY`].
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRow {
    pub face_id: i64,
    /// Image path relative to the image directory, e.g. `0/image00002.jpg`.
    pub file_path: String,
    pub rect: FaceRect,
    pub pose: Pose,
    pub sex: Option<String>,
}

/// One row of [`LANDMARK_QUERY`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkRow {
    pub face_id: i64,
    /// 1-based landmark index.
    pub feature_id: i64,
    pub x: f64,
    pub y: f64,
}

/// Read-only handle to the source database.
pub struct SourceStore {
    conn: Connection,
}

impl SourceStore {
    /// Open the database at `path` in read-only mode.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Err(StorageError::NotFound(path.display().to_string()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| StorageError::Open {
            path: path.display().to_string(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "opened source database");
        Ok(Self { conn })
    }

    /// Run `spec`, mapping every row with `map`. Row order is preserved.
    pub fn query_as<T, F>(&self, spec: &QuerySpec<'_>, mut map: F) -> Result<Vec<T>, StorageError>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let sql = spec.to_sql();
        let query_err = |source| StorageError::Query {
            sql: sql.clone(),
            source,
        };

        let mut stmt = self.conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| map(row))
            .map_err(query_err)?
            .collect::<rusqlite::Result<Vec<T>>>()
            .map_err(query_err)?;

        tracing::debug!(sql = %sql, rows = rows.len(), "query complete");
        Ok(rows)
    }

    /// Run `spec` and return each row as a plain tuple of SQLite values.
    pub fn query(&self, spec: &QuerySpec<'_>) -> Result<Vec<Vec<Value>>, StorageError> {
        self.query_as(spec, |row| {
            let n = row.as_ref().column_count();
            (0..n).map(|i| row.get::<_, Value>(i)).collect()
        })
    }

    pub fn face_rows(&self) -> Result<Vec<FaceRow>, StorageError> {
        self.query_as(&FACE_QUERY, |row| {
            Ok(FaceRow {
                face_id: row.get(0)?,
                file_path: row.get(1)?,
                rect: FaceRect {
                    x: row.get(2)?,
                    y: row.get(3)?,
                    w: row.get(4)?,
                    h: row.get(5)?,
                },
                pose: Pose {
                    roll: row.get(6)?,
                    pitch: row.get(7)?,
                    yaw: row.get(8)?,
                },
                sex: row.get(9)?,
            })
        })
    }

    pub fn landmark_rows(&self) -> Result<Vec<LandmarkRow>, StorageError> {
        self.query_as(&LANDMARK_QUERY, |row| {
            Ok(LandmarkRow {
                face_id: row.get(0)?,
                feature_id: row.get(1)?,
                x: row.get(2)?,
                y: row.get(3)?,
            })
        })
    }
}
