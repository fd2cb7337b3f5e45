use anyhow::Result;
use rusqlite::{Connection, Row, TransactionBehavior};
use uuid::Uuid;

use studycircle_types::models::Answer;

use super::questions::query_question;
use super::{OptionalExt, get_timestamp, get_uuid};
use crate::Database;
use crate::models::{AcceptOutcome, AcceptedAnswer, NewAnswer};

const ANSWER_COLUMNS: &str =
    "id, question_id, user_id, content, upvotes, downvotes, is_accepted, created_at, updated_at";

impl Database {
    pub fn insert_answer(&self, a: &NewAnswer) -> Result<Answer> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO answers (id, question_id, user_id, content) VALUES (?1, ?2, ?3, ?4)",
                (a.id.to_string(), a.question_id.to_string(), a.user_id.to_string(), &a.content),
            )?;
            query_answer(conn, a.id)?.ok_or_else(|| anyhow::anyhow!("answer {} vanished after insert", a.id))
        })
    }

    pub fn get_answer(&self, id: Uuid) -> Result<Option<Answer>> {
        self.with_conn(|conn| query_answer(conn, id))
    }

    /// Accepted answer first, then by net votes, then oldest first.
    pub fn list_answers(&self, question_id: Uuid) -> Result<Vec<Answer>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM answers WHERE question_id = ?1
                 ORDER BY is_accepted DESC, (upvotes - downvotes) DESC, created_at ASC, rowid ASC",
                ANSWER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([question_id.to_string()], map_answer)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_answer_content(&self, id: Uuid, content: &str) -> Result<Option<Answer>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE answers SET content = ?2 WHERE id = ?1",
                (id.to_string(), content),
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_answer(conn, id)
        })
    }

    pub fn vote_answer(&self, id: Uuid, up: bool) -> Result<Option<Answer>> {
        let sql = if up {
            "UPDATE answers SET upvotes = upvotes + 1 WHERE id = ?1"
        } else {
            "UPDATE answers SET downvotes = downvotes + 1 WHERE id = ?1"
        };
        self.with_conn_mut(|conn| {
            if conn.execute(sql, [id.to_string()])? == 0 {
                return Ok(None);
            }
            query_answer(conn, id)
        })
    }

    /// Move the question's acceptance to `answer_id` and mark it resolved,
    /// all inside one immediate transaction. The already-accepted check runs
    /// under the same lock, so concurrent accepts of one answer succeed once.
    pub fn accept_answer(&self, question_id: Uuid, answer_id: Uuid) -> Result<AcceptOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let qid = question_id.to_string();
            let aid = answer_id.to_string();

            let current: Option<(bool, bool)> = tx
                .query_row(
                    "SELECT is_accepted, accepted_before FROM answers WHERE id = ?1 AND question_id = ?2",
                    [&aid, &qid],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((is_accepted, accepted_before)) = current else {
                return Ok(AcceptOutcome::NotInQuestion);
            };
            if is_accepted {
                return Ok(AcceptOutcome::AlreadyAccepted);
            }

            let previous: Option<String> = tx
                .query_row(
                    "SELECT user_id FROM answers WHERE question_id = ?1 AND is_accepted = 1",
                    [&qid],
                    |row| row.get(0),
                )
                .optional()?;

            // Clear first: the partial unique index forbids two accepted rows.
            tx.execute(
                "UPDATE answers SET is_accepted = 0 WHERE question_id = ?1 AND is_accepted = 1",
                [&qid],
            )?;
            tx.execute(
                "UPDATE answers SET is_accepted = 1, accepted_before = 1 WHERE id = ?1",
                [&aid],
            )?;
            tx.execute("UPDATE questions SET is_resolved = 1 WHERE id = ?1", [&qid])?;

            let answer = query_answer(&tx, answer_id)?
                .ok_or_else(|| anyhow::anyhow!("answer {} vanished during accept", answer_id))?;
            let question = query_question(&tx, question_id)?
                .ok_or_else(|| anyhow::anyhow!("question {} vanished during accept", question_id))?;
            tx.commit()?;

            let previous_author: Option<Uuid> = previous.map(|id| id.parse::<Uuid>()).transpose()?;

            Ok(AcceptOutcome::Accepted(AcceptedAnswer {
                answer,
                question,
                previous_author,
                first_acceptance: !accepted_before,
            }))
        })
    }
}

fn query_answer(conn: &Connection, id: Uuid) -> Result<Option<Answer>> {
    let sql = format!("SELECT {} FROM answers WHERE id = ?1", ANSWER_COLUMNS);
    conn.query_row(&sql, [id.to_string()], map_answer).optional()
}

fn map_answer(row: &Row<'_>) -> rusqlite::Result<Answer> {
    Ok(Answer {
        id: get_uuid(row, 0)?,
        question_id: get_uuid(row, 1)?,
        user_id: get_uuid(row, 2)?,
        content: row.get(3)?,
        upvotes: row.get(4)?,
        downvotes: row.get(5)?,
        is_accepted: row.get(6)?,
        created_at: get_timestamp(row, 7)?,
        updated_at: get_timestamp(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewQuestion;
    use crate::queries::test_support::user;
    use studycircle_types::models::DifficultyLevel;

    fn setup() -> (Database, Uuid, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let asker = user(&db, "ana@school.edu");
        let helper = user(&db, "ben@school.edu");
        let q = db
            .insert_question(&NewQuestion {
                id: Uuid::new_v4(),
                user_id: asker,
                subject_id: None,
                title: "Photosynthesis".into(),
                content: "What are the inputs?".into(),
                difficulty: DifficultyLevel::Easy,
                grade_level: None,
            })
            .unwrap();
        (db, asker, helper, q.id)
    }

    fn answer(db: &Database, question_id: Uuid, user_id: Uuid, content: &str) -> Answer {
        db.insert_answer(&NewAnswer {
            id: Uuid::new_v4(),
            question_id,
            user_id,
            content: content.into(),
        })
        .unwrap()
    }

    fn accepted(outcome: AcceptOutcome) -> AcceptedAnswer {
        match outcome {
            AcceptOutcome::Accepted(accepted) => accepted,
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_accept_resolves_question() {
        let (db, _asker, helper, qid) = setup();
        let a1 = answer(&db, qid, helper, "Light, water, CO2");

        let accepted = accepted(db.accept_answer(qid, a1.id).unwrap());
        assert!(accepted.answer.is_accepted);
        assert!(accepted.question.is_resolved);
        assert!(accepted.first_acceptance);
        assert_eq!(accepted.previous_author, None);
    }

    #[test]
    fn test_accepting_second_answer_clears_first() {
        let (db, asker, helper, qid) = setup();
        let a1 = answer(&db, qid, helper, "Light, water, CO2");
        let a2 = answer(&db, qid, asker, "Sunlight and chlorophyll");

        accepted(db.accept_answer(qid, a1.id).unwrap());
        let moved = accepted(db.accept_answer(qid, a2.id).unwrap());

        assert_eq!(moved.previous_author, Some(helper));
        assert!(moved.first_acceptance);
        assert!(!db.get_answer(a1.id).unwrap().unwrap().is_accepted);
        assert!(db.get_answer(a2.id).unwrap().unwrap().is_accepted);
        assert!(db.get_question(qid).unwrap().unwrap().is_resolved);

        let accepted: Vec<_> = db.list_answers(qid).unwrap().into_iter().filter(|a| a.is_accepted).collect();
        assert_eq!(accepted.len(), 1);
    }

    #[test]
    fn test_moving_back_is_not_a_first_acceptance() {
        let (db, asker, helper, qid) = setup();
        let a1 = answer(&db, qid, helper, "Light, water, CO2");
        let a2 = answer(&db, qid, asker, "Sunlight and chlorophyll");

        assert!(accepted(db.accept_answer(qid, a1.id).unwrap()).first_acceptance);
        assert!(accepted(db.accept_answer(qid, a2.id).unwrap()).first_acceptance);
        let back = accepted(db.accept_answer(qid, a1.id).unwrap());
        assert!(!back.first_acceptance);
        assert!(back.answer.is_accepted);
    }

    #[test]
    fn test_accept_is_checked_inside_the_transaction() {
        let (db, _asker, helper, qid) = setup();
        let a1 = answer(&db, qid, helper, "Light, water, CO2");
        accepted(db.accept_answer(qid, a1.id).unwrap());

        assert!(matches!(db.accept_answer(qid, a1.id).unwrap(), AcceptOutcome::AlreadyAccepted));
        assert!(matches!(
            db.accept_answer(qid, Uuid::new_v4()).unwrap(),
            AcceptOutcome::NotInQuestion
        ));
        // Prior acceptance survives the rejected attempts.
        assert!(db.get_answer(a1.id).unwrap().unwrap().is_accepted);
    }

    #[test]
    fn test_votes_and_ordering() {
        let (db, asker, helper, qid) = setup();
        let a1 = answer(&db, qid, helper, "one");
        let a2 = answer(&db, qid, asker, "two");

        db.vote_answer(a2.id, true).unwrap();
        let a1 = db.vote_answer(a1.id, false).unwrap().unwrap();
        assert_eq!(a1.downvotes, 1);

        let order: Vec<Uuid> = db.list_answers(qid).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(order, vec![a2.id, a1.id]);
    }
}
