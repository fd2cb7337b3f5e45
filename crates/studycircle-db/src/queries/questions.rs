use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use studycircle_types::models::Question;

use super::{OptionalExt, clamp_limit, get_enum, get_opt_uuid, get_timestamp, get_uuid};
use crate::Database;
use crate::models::{NewQuestion, QuestionChanges, QuestionFilter};

pub(crate) const QUESTION_COLUMNS: &str = "id, user_id, subject_id, title, content, difficulty, grade_level, \
     view_count, upvotes, is_resolved, created_at, updated_at";

const MAX_QUESTION_PAGE: u32 = 100;

impl Database {
    pub fn insert_question(&self, q: &NewQuestion) -> Result<Question> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO questions (id, user_id, subject_id, title, content, difficulty, grade_level)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    q.id.to_string(),
                    q.user_id.to_string(),
                    q.subject_id.map(|s| s.to_string()),
                    q.title,
                    q.content,
                    q.difficulty.as_str(),
                    q.grade_level,
                ],
            )?;
            query_question(conn, q.id)?.ok_or_else(|| anyhow::anyhow!("question {} vanished after insert", q.id))
        })
    }

    pub fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
        self.with_conn(|conn| query_question(conn, id))
    }

    /// Newest first.
    pub fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM questions
                 WHERE (?1 IS NULL OR subject_id = ?1)
                   AND (?2 IS NULL OR user_id = ?2)
                   AND (?3 IS NULL OR is_resolved = ?3)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?4",
                QUESTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![
                        filter.subject_id.map(|s| s.to_string()),
                        filter.user_id.map(|s| s.to_string()),
                        filter.resolved,
                        clamp_limit(filter.limit, MAX_QUESTION_PAGE),
                    ],
                    map_question,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_question(&self, id: Uuid, changes: &QuestionChanges) -> Result<Option<Question>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE questions SET
                    title = COALESCE(?2, title),
                    content = COALESCE(?3, content),
                    subject_id = COALESCE(?4, subject_id),
                    difficulty = COALESCE(?5, difficulty),
                    grade_level = COALESCE(?6, grade_level)
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    changes.title,
                    changes.content,
                    changes.subject_id.map(|s| s.to_string()),
                    changes.difficulty.map(|d| d.as_str()),
                    changes.grade_level,
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_question(conn, id)
        })
    }

    /// Atomic view counter bump. Returns the new count.
    pub fn increment_question_views(&self, id: Uuid) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "UPDATE questions SET view_count = view_count + 1 WHERE id = ?1 RETURNING view_count",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn upvote_question(&self, id: Uuid) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "UPDATE questions SET upvotes = upvotes + 1 WHERE id = ?1 RETURNING upvotes",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()
        })
    }
}

pub(crate) fn query_question(conn: &Connection, id: Uuid) -> Result<Option<Question>> {
    let sql = format!("SELECT {} FROM questions WHERE id = ?1", QUESTION_COLUMNS);
    conn.query_row(&sql, [id.to_string()], map_question).optional()
}

pub(crate) fn map_question(row: &Row<'_>) -> rusqlite::Result<Question> {
    Ok(Question {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        subject_id: get_opt_uuid(row, 2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        difficulty: get_enum(row, 5)?,
        grade_level: row.get(6)?,
        view_count: row.get(7)?,
        upvotes: row.get(8)?,
        is_resolved: row.get(9)?,
        created_at: get_timestamp(row, 10)?,
        updated_at: get_timestamp(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::SUBJECT_MATH;
    use crate::queries::test_support::user;
    use studycircle_types::models::DifficultyLevel;

    fn new_question(user_id: Uuid, title: &str) -> NewQuestion {
        NewQuestion {
            id: Uuid::new_v4(),
            user_id,
            subject_id: Some(SUBJECT_MATH.parse().unwrap()),
            title: title.to_string(),
            content: "How do I factor x^2 - 5x + 6?".to_string(),
            difficulty: DifficultyLevel::Medium,
            grade_level: Some(9),
        }
    }

    #[test]
    fn test_insert_then_fetch_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let asker = user(&db, "ana@school.edu");
        let created = db.insert_question(&new_question(asker, "Factoring")).unwrap();

        let fetched = db.get_question(created.id).unwrap().unwrap();
        assert_eq!(fetched.title, "Factoring");
        assert_eq!(fetched.content, "How do I factor x^2 - 5x + 6?");
        assert_eq!(fetched.difficulty, DifficultyLevel::Medium);
        assert!(!fetched.is_resolved);
        assert_eq!(fetched.view_count, 0);
    }

    #[test]
    fn test_counters_are_monotonic() {
        let db = Database::open_in_memory().unwrap();
        let asker = user(&db, "ana@school.edu");
        let q = db.insert_question(&new_question(asker, "Factoring")).unwrap();

        assert_eq!(db.increment_question_views(q.id).unwrap(), Some(1));
        assert_eq!(db.increment_question_views(q.id).unwrap(), Some(2));
        assert_eq!(db.upvote_question(q.id).unwrap(), Some(1));
        assert_eq!(db.increment_question_views(Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn test_list_filters_and_orders() {
        let db = Database::open_in_memory().unwrap();
        let asker = user(&db, "ana@school.edu");
        let other = user(&db, "ben@school.edu");
        db.insert_question(&new_question(asker, "First")).unwrap();
        db.insert_question(&new_question(asker, "Second")).unwrap();
        db.insert_question(&new_question(other, "Third")).unwrap();

        let mine = db
            .list_questions(&QuestionFilter { user_id: Some(asker), ..Default::default() })
            .unwrap();
        let titles: Vec<&str> = mine.iter().map(|q| q.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "First"]);

        let open = db
            .list_questions(&QuestionFilter { resolved: Some(false), limit: 2, ..Default::default() })
            .unwrap();
        assert_eq!(open.len(), 2);
    }

    #[test]
    fn test_update_only_touches_given_fields() {
        let db = Database::open_in_memory().unwrap();
        let asker = user(&db, "ana@school.edu");
        let q = db.insert_question(&new_question(asker, "Factoring")).unwrap();

        let changes = QuestionChanges { difficulty: Some(DifficultyLevel::Hard), ..Default::default() };
        let updated = db.update_question(q.id, &changes).unwrap().unwrap();
        assert_eq!(updated.difficulty, DifficultyLevel::Hard);
        assert_eq!(updated.title, "Factoring");
    }
}
