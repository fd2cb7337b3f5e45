use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use studycircle_types::models::Notification;

use super::{OptionalExt, clamp_limit, get_enum, get_opt_uuid, get_timestamp, get_uuid};
use crate::Database;
use crate::models::NewNotification;

const NOTIFICATION_COLUMNS: &str = "id, user_id, type, title, message, related_id, is_read, created_at";

const MAX_NOTIFICATION_PAGE: u32 = 100;

impl Database {
    pub fn insert_notification(&self, n: &NewNotification) -> Result<Notification> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, type, title, message, related_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    n.id.to_string(),
                    n.user_id.to_string(),
                    n.kind.as_str(),
                    n.title,
                    n.message,
                    n.related_id.map(|r| r.to_string()),
                ],
            )?;
            query_notification(conn, n.id)?
                .ok_or_else(|| anyhow::anyhow!("notification {} vanished after insert", n.id))
        })
    }

    pub fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        self.with_conn(|conn| query_notification(conn, id))
    }

    /// Newest first.
    pub fn list_notifications(&self, user_id: Uuid, unread_only: bool, limit: u32) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM notifications
                 WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
                NOTIFICATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![user_id.to_string(), unread_only, clamp_limit(limit, MAX_NOTIFICATION_PAGE)],
                    map_notification,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn mark_notification_read(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    /// Returns how many notifications flipped to read.
    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                [user_id.to_string()],
            )?;
            Ok(n)
        })
    }

    pub fn unread_notification_count(&self, user_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }
}

fn query_notification(conn: &Connection, id: Uuid) -> Result<Option<Notification>> {
    let sql = format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLUMNS);
    conn.query_row(&sql, [id.to_string()], map_notification).optional()
}

fn map_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        kind: get_enum(row, 2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        related_id: get_opt_uuid(row, 5)?,
        is_read: row.get(6)?,
        created_at: get_timestamp(row, 7)?,
    })
}
