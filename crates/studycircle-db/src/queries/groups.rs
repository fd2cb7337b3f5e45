use anyhow::Result;
use rusqlite::{Connection, Row, TransactionBehavior};
use uuid::Uuid;

use studycircle_types::models::{GroupMembership, GroupRole, StudyGroup};

use super::{OptionalExt, get_enum, get_opt_uuid, get_timestamp, get_uuid};
use crate::Database;
use crate::models::{GroupChanges, JoinOutcome, NewGroup};

const GROUP_SELECT: &str = "SELECT g.id, g.creator_id, g.subject_id, g.name, g.description, g.privacy,
        g.max_members,
        (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id),
        g.created_at, g.updated_at
     FROM study_groups g";

impl Database {
    /// Insert the group and enroll its creator as admin.
    pub fn create_group(&self, g: &NewGroup) -> Result<StudyGroup> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO study_groups (id, creator_id, subject_id, name, description, privacy, max_members)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    g.id.to_string(),
                    g.creator_id.to_string(),
                    g.subject_id.map(|s| s.to_string()),
                    g.name,
                    g.description,
                    g.privacy.as_str(),
                    g.max_members,
                ],
            )?;
            tx.execute(
                "INSERT INTO group_members (id, group_id, user_id, role) VALUES (?1, ?2, ?3, ?4)",
                (
                    Uuid::new_v4().to_string(),
                    g.id.to_string(),
                    g.creator_id.to_string(),
                    GroupRole::Admin.as_str(),
                ),
            )?;
            let group = query_group(&tx, g.id)?
                .ok_or_else(|| anyhow::anyhow!("group {} vanished after insert", g.id))?;
            tx.commit()?;
            Ok(group)
        })
    }

    pub fn get_group(&self, id: Uuid) -> Result<Option<StudyGroup>> {
        self.with_conn(|conn| query_group(conn, id))
    }

    pub fn list_groups(&self, subject_id: Option<Uuid>) -> Result<Vec<StudyGroup>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE (?1 IS NULL OR g.subject_id = ?1) ORDER BY g.created_at DESC, g.rowid DESC",
                GROUP_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([subject_id.map(|s| s.to_string())], map_group)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_group(&self, id: Uuid, changes: &GroupChanges) -> Result<Option<StudyGroup>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE study_groups SET
                    name = COALESCE(?2, name),
                    description = COALESCE(?3, description),
                    privacy = COALESCE(?4, privacy),
                    max_members = COALESCE(?5, max_members)
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    changes.name,
                    changes.description,
                    changes.privacy.map(|p| p.as_str()),
                    changes.max_members,
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_group(conn, id)
        })
    }

    pub fn member_role(&self, group_id: Uuid, user_id: Uuid) -> Result<Option<GroupRole>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT role FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                [group_id.to_string(), user_id.to_string()],
                |row| get_enum(row, 0),
            )
            .optional()
        })
    }

    pub fn is_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.member_role(group_id, user_id)?.is_some())
    }

    /// Ids of every group the user belongs to.
    pub fn groups_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT group_id FROM group_members WHERE user_id = ?1")?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| get_uuid(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_members(&self, group_id: Uuid) -> Result<Vec<GroupMembership>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, group_id, user_id, role, joined_at FROM group_members
                 WHERE group_id = ?1 ORDER BY joined_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([group_id.to_string()], |row| {
                    Ok(GroupMembership {
                        id: get_uuid(row, 0)?,
                        group_id: get_uuid(row, 1)?,
                        user_id: get_uuid(row, 2)?,
                        role: get_enum(row, 3)?,
                        joined_at: get_timestamp(row, 4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Enroll `user_id` as a plain member unless the group is at capacity.
    /// The capacity check and insert share one immediate transaction, and a
    /// pending invitation is consumed on success.
    pub fn join_group(&self, group_id: Uuid, user_id: Uuid) -> Result<JoinOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let gid = group_id.to_string();
            let uid = user_id.to_string();

            let capacity: Option<(i64, i64)> = tx
                .query_row(
                    "SELECT g.max_members, (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id)
                     FROM study_groups g WHERE g.id = ?1",
                    [&gid],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((max_members, member_count)) = capacity else {
                return Ok(JoinOutcome::GroupNotFound);
            };

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                    [&gid, &uid],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Ok(JoinOutcome::AlreadyMember);
            }
            if member_count >= max_members {
                return Ok(JoinOutcome::GroupFull);
            }

            tx.execute(
                "INSERT INTO group_members (id, group_id, user_id, role) VALUES (?1, ?2, ?3, ?4)",
                (Uuid::new_v4().to_string(), &gid, &uid, GroupRole::Member.as_str()),
            )?;
            tx.execute(
                "DELETE FROM group_invitations WHERE group_id = ?1 AND user_id = ?2",
                [&gid, &uid],
            )?;
            tx.commit()?;
            Ok(JoinOutcome::Joined)
        })
    }

    /// Record a pending invitation. Returns false if one already existed.
    pub fn add_invitation(&self, group_id: Uuid, user_id: Uuid, invited_by: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO group_invitations (group_id, user_id, invited_by) VALUES (?1, ?2, ?3)",
                [group_id.to_string(), user_id.to_string(), invited_by.to_string()],
            )?;
            Ok(n == 1)
        })
    }

    pub fn has_invitation(&self, group_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM group_invitations WHERE group_id = ?1 AND user_id = ?2",
                    [group_id.to_string(), user_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }
}

fn query_group(conn: &Connection, id: Uuid) -> Result<Option<StudyGroup>> {
    let sql = format!("{} WHERE g.id = ?1", GROUP_SELECT);
    conn.query_row(&sql, [id.to_string()], map_group).optional()
}

fn map_group(row: &Row<'_>) -> rusqlite::Result<StudyGroup> {
    Ok(StudyGroup {
        id: get_uuid(row, 0)?,
        creator_id: get_uuid(row, 1)?,
        subject_id: get_opt_uuid(row, 2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        privacy: get_enum(row, 5)?,
        max_members: row.get(6)?,
        member_count: row.get(7)?,
        created_at: get_timestamp(row, 8)?,
        updated_at: get_timestamp(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::user;
    use studycircle_types::models::PrivacyLevel;

    fn group(db: &Database, creator: Uuid, max_members: i64) -> StudyGroup {
        db.create_group(&NewGroup {
            id: Uuid::new_v4(),
            creator_id: creator,
            subject_id: None,
            name: "Algebra Club".into(),
            description: None,
            privacy: PrivacyLevel::Public,
            max_members,
        })
        .unwrap()
    }

    #[test]
    fn test_creator_is_admin_member() {
        let db = Database::open_in_memory().unwrap();
        let creator = user(&db, "ana@school.edu");
        let g = group(&db, creator, 5);

        assert_eq!(g.member_count, 1);
        assert_eq!(db.member_role(g.id, creator).unwrap(), Some(GroupRole::Admin));
        assert_eq!(db.groups_for_user(creator).unwrap(), vec![g.id]);
    }

    #[test]
    fn test_join_respects_capacity() {
        let db = Database::open_in_memory().unwrap();
        let creator = user(&db, "ana@school.edu");
        let ben = user(&db, "ben@school.edu");
        let cam = user(&db, "cam@school.edu");
        let g = group(&db, creator, 2);

        assert_eq!(db.join_group(g.id, ben).unwrap(), JoinOutcome::Joined);
        assert_eq!(db.join_group(g.id, ben).unwrap(), JoinOutcome::AlreadyMember);
        assert_eq!(db.join_group(g.id, cam).unwrap(), JoinOutcome::GroupFull);
        assert_eq!(db.get_group(g.id).unwrap().unwrap().member_count, 2);
        assert_eq!(db.join_group(Uuid::new_v4(), cam).unwrap(), JoinOutcome::GroupNotFound);
    }

    #[test]
    fn test_join_consumes_invitation() {
        let db = Database::open_in_memory().unwrap();
        let creator = user(&db, "ana@school.edu");
        let ben = user(&db, "ben@school.edu");
        let g = group(&db, creator, 5);

        assert!(db.add_invitation(g.id, ben, creator).unwrap());
        assert!(!db.add_invitation(g.id, ben, creator).unwrap());
        assert!(db.has_invitation(g.id, ben).unwrap());

        db.join_group(g.id, ben).unwrap();
        assert!(!db.has_invitation(g.id, ben).unwrap());
        let members = db.list_members(g.id).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[1].role, GroupRole::Member);
    }
}
