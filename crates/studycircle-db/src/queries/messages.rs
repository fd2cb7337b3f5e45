use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;

use studycircle_types::models::Message;

use super::{OptionalExt, clamp_limit, get_enum, get_timestamp, get_uuid};
use crate::Database;
use crate::models::NewMessage;

const MAX_MESSAGE_WINDOW: u32 = 200;

impl Database {
    /// Append a chat message. There is no update or delete counterpart.
    pub fn insert_message(&self, m: &NewMessage) -> Result<Message> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "INSERT INTO messages (id, group_id, user_id, content, message_type)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING id, group_id, user_id, content, message_type, created_at",
                rusqlite::params![
                    m.id.to_string(),
                    m.group_id.to_string(),
                    m.user_id.to_string(),
                    m.content,
                    m.message_type.as_str(),
                ],
                map_message,
            )
            .optional()?
            .ok_or_else(|| anyhow::anyhow!("message insert returned no row"))
        })
    }

    /// The most recent `limit` messages of a group, oldest first.
    pub fn recent_messages(&self, group_id: Uuid, limit: u32) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, group_id, user_id, content, message_type, created_at FROM (
                    SELECT id, group_id, user_id, content, message_type, created_at, rowid AS seq
                    FROM messages
                    WHERE group_id = ?1
                    ORDER BY created_at DESC, rowid DESC
                    LIMIT ?2
                 ) ORDER BY created_at ASC, seq ASC",
            )?;
            let rows = stmt
                .query_map(
                    rusqlite::params![group_id.to_string(), clamp_limit(limit, MAX_MESSAGE_WINDOW)],
                    map_message,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: get_uuid(row, 0)?,
        group_id: get_uuid(row, 1)?,
        user_id: get_uuid(row, 2)?,
        content: row.get(3)?,
        message_type: get_enum(row, 4)?,
        created_at: get_timestamp(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewGroup;
    use crate::queries::test_support::user;
    use studycircle_types::models::{MessageType, PrivacyLevel};

    #[test]
    fn test_recent_window_is_ascending() {
        let db = Database::open_in_memory().unwrap();
        let ana = user(&db, "ana@school.edu");
        let g = db
            .create_group(&NewGroup {
                id: Uuid::new_v4(),
                creator_id: ana,
                subject_id: None,
                name: "Chem".into(),
                description: None,
                privacy: PrivacyLevel::Public,
                max_members: 4,
            })
            .unwrap();

        for i in 0..5 {
            db.insert_message(&NewMessage {
                id: Uuid::new_v4(),
                group_id: g.id,
                user_id: ana,
                content: format!("msg {}", i),
                message_type: MessageType::Text,
            })
            .unwrap();
        }

        let window = db.recent_messages(g.id, 3).unwrap();
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 2", "msg 3", "msg 4"]);
    }
}
