use std::collections::HashSet;

use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;

use studycircle_types::models::{ActivityCounts, Badge, UserBadge};

use super::{get_enum, get_timestamp, get_uuid};
use crate::Database;

impl Database {
    pub fn list_badges(&self) -> Result<Vec<Badge>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, icon, requirement_type, requirement_value
                 FROM badges ORDER BY requirement_value ASC, name ASC",
            )?;
            let rows = stmt
                .query_map([], |row| map_badge(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn earned_badges(&self, user_id: Uuid) -> Result<Vec<UserBadge>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT ub.user_id, ub.earned_at,
                        b.id, b.name, b.description, b.icon, b.requirement_type, b.requirement_value
                 FROM user_badges ub
                 JOIN badges b ON b.id = ub.badge_id
                 WHERE ub.user_id = ?1
                 ORDER BY ub.earned_at ASC, b.requirement_value ASC, b.name ASC",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(UserBadge {
                        user_id: get_uuid(row, 0)?,
                        earned_at: get_timestamp(row, 1)?,
                        badge: map_badge(row, 2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn earned_badge_ids(&self, user_id: Uuid) -> Result<HashSet<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT badge_id FROM user_badges WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id.to_string()], |row| get_uuid(row, 0))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            Ok(ids)
        })
    }

    /// Idempotent award guarded by the (user, badge) primary key.
    /// Returns true only when a new row was written.
    pub fn award_badge(&self, user_id: Uuid, badge_id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO user_badges (user_id, badge_id) VALUES (?1, ?2)",
                [user_id.to_string(), badge_id.to_string()],
            )?;
            Ok(n == 1)
        })
    }

    /// Counts every badge threshold is measured against.
    pub fn activity_counts(&self, user_id: Uuid) -> Result<ActivityCounts> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT
                    COALESCE((SELECT points FROM profiles WHERE user_id = ?1), 0),
                    (SELECT COUNT(*) FROM questions WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM answers WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM answers WHERE user_id = ?1 AND is_accepted = 1),
                    (SELECT COUNT(*) FROM resources WHERE user_id = ?1)",
                [user_id.to_string()],
                |row| {
                    Ok(ActivityCounts {
                        points: row.get(0)?,
                        questions_asked: row.get(1)?,
                        answers_given: row.get(2)?,
                        answers_accepted: row.get(3)?,
                        resources_shared: row.get(4)?,
                    })
                },
            )?;
            Ok(counts)
        })
    }
}

fn map_badge(row: &Row<'_>, offset: usize) -> rusqlite::Result<Badge> {
    Ok(Badge {
        id: get_uuid(row, offset)?,
        name: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        icon: row.get(offset + 3)?,
        requirement_type: get_enum(row, offset + 4)?,
        requirement_value: row.get(offset + 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::user;

    #[test]
    fn test_catalog_seeded_in_award_order() {
        let db = Database::open_in_memory().unwrap();
        let badges = db.list_badges().unwrap();
        assert_eq!(badges.len(), 10);
        assert!(badges.windows(2).all(|w| w[0].requirement_value <= w[1].requirement_value));
        assert!(badges.iter().any(|b| b.name == "Problem Solver"));
    }

    #[test]
    fn test_award_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let ana = user(&db, "ana@school.edu");
        let first = db.list_badges().unwrap().into_iter().find(|b| b.name == "First Question").unwrap();

        assert!(db.award_badge(ana, first.id).unwrap());
        assert!(!db.award_badge(ana, first.id).unwrap());

        let earned = db.earned_badges(ana).unwrap();
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].badge.name, "First Question");
        assert!(db.earned_badge_ids(ana).unwrap().contains(&first.id));
    }

    #[test]
    fn test_activity_counts_for_new_user() {
        let db = Database::open_in_memory().unwrap();
        let ana = user(&db, "ana@school.edu");
        db.add_points(ana, 40).unwrap();
        let counts = db.activity_counts(ana).unwrap();
        assert_eq!(counts, ActivityCounts { points: 40, ..Default::default() });
    }
}
