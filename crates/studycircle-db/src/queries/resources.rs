use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use studycircle_types::models::Resource;

use super::{OptionalExt, clamp_limit, get_opt_uuid, get_timestamp, get_uuid};
use crate::Database;
use crate::models::{NewResource, ResourceChanges};

const RESOURCE_COLUMNS: &str = "id, user_id, subject_id, title, description, file_url, file_size, \
     download_count, rating, rating_count, created_at, updated_at";

const MAX_RESOURCE_PAGE: u32 = 100;

impl Database {
    pub fn insert_resource(&self, r: &NewResource) -> Result<Resource> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO resources (id, user_id, subject_id, title, description, file_url, file_size)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    r.id.to_string(),
                    r.user_id.to_string(),
                    r.subject_id.map(|s| s.to_string()),
                    r.title,
                    r.description,
                    r.file_url,
                    r.file_size,
                ],
            )?;
            query_resource(conn, r.id)?.ok_or_else(|| anyhow::anyhow!("resource {} vanished after insert", r.id))
        })
    }

    pub fn get_resource(&self, id: Uuid) -> Result<Option<Resource>> {
        self.with_conn(|conn| query_resource(conn, id))
    }

    pub fn list_resources(&self, subject_id: Option<Uuid>, limit: u32) -> Result<Vec<Resource>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM resources WHERE (?1 IS NULL OR subject_id = ?1)
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                RESOURCE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![subject_id.map(|s| s.to_string()), clamp_limit(limit, MAX_RESOURCE_PAGE)],
                    map_resource,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_resource(&self, id: Uuid, changes: &ResourceChanges) -> Result<Option<Resource>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE resources SET
                    title = COALESCE(?2, title),
                    description = COALESCE(?3, description),
                    subject_id = COALESCE(?4, subject_id)
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    changes.title,
                    changes.description,
                    changes.subject_id.map(|s| s.to_string()),
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_resource(conn, id)
        })
    }

    /// Atomic download counter bump. Returns the file reference and new count.
    pub fn record_download(&self, id: Uuid) -> Result<Option<(String, i64)>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "UPDATE resources SET download_count = download_count + 1 WHERE id = ?1
                 RETURNING file_url, download_count",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
    }

    /// Fold one rating into the running average.
    pub fn rate_resource(&self, id: Uuid, rating: i64) -> Result<Option<Resource>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE resources SET
                    rating = (rating * rating_count + ?2) / (rating_count + 1),
                    rating_count = rating_count + 1
                 WHERE id = ?1",
                rusqlite::params![id.to_string(), rating as f64],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_resource(conn, id)
        })
    }
}

fn query_resource(conn: &Connection, id: Uuid) -> Result<Option<Resource>> {
    let sql = format!("SELECT {} FROM resources WHERE id = ?1", RESOURCE_COLUMNS);
    conn.query_row(&sql, [id.to_string()], map_resource).optional()
}

fn map_resource(row: &Row<'_>) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        subject_id: get_opt_uuid(row, 2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        file_url: row.get(5)?,
        file_size: row.get(6)?,
        download_count: row.get(7)?,
        rating: row.get(8)?,
        rating_count: row.get(9)?,
        created_at: get_timestamp(row, 10)?,
        updated_at: get_timestamp(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::user;

    fn resource(db: &Database, owner: Uuid) -> Resource {
        db.insert_resource(&NewResource {
            id: Uuid::new_v4(),
            user_id: owner,
            subject_id: None,
            title: "Cell biology notes".into(),
            description: Some("Chapter 3".into()),
            file_url: "resources/cell-notes.pdf".into(),
            file_size: 20_480,
        })
        .unwrap()
    }

    #[test]
    fn test_download_counter() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "ana@school.edu");
        let r = resource(&db, owner);

        assert_eq!(
            db.record_download(r.id).unwrap(),
            Some(("resources/cell-notes.pdf".to_string(), 1))
        );
        assert_eq!(db.record_download(r.id).unwrap().map(|(_, n)| n), Some(2));
        assert_eq!(db.record_download(Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn test_rating_is_running_average() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "ana@school.edu");
        let r = resource(&db, owner);

        db.rate_resource(r.id, 5).unwrap();
        let rated = db.rate_resource(r.id, 2).unwrap().unwrap();
        assert_eq!(rated.rating_count, 2);
        assert!((rated.rating - 3.5).abs() < 1e-9);
    }
}
