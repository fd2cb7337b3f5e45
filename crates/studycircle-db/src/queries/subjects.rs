use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;

use studycircle_types::models::Subject;

use super::{OptionalExt, get_uuid};
use crate::Database;

impl Database {
    pub fn list_subjects(&self, active_only: bool) -> Result<Vec<Subject>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, code, grade_levels, is_active FROM subjects
                 WHERE (?1 = 0 OR is_active = 1)
                 ORDER BY name",
            )?;
            let rows = stmt
                .query_map([active_only], map_subject)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, code, grade_levels, is_active FROM subjects WHERE id = ?1",
                [id.to_string()],
                map_subject,
            )
            .optional()
        })
    }
}

fn map_subject(row: &Row<'_>) -> rusqlite::Result<Subject> {
    let grade_levels: String = row.get(3)?;
    Ok(Subject {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        grade_levels: grade_levels
            .split(',')
            .filter_map(|g| g.trim().parse().ok())
            .collect(),
        is_active: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::SUBJECT_COMPUTER_SCIENCE;

    #[test]
    fn test_seeded_subjects() {
        let db = Database::open_in_memory().unwrap();
        let subjects = db.list_subjects(true).unwrap();
        let codes: Vec<&str> = subjects.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["CS", "ENG", "MATH", "SCI", "SS"]);

        let cs = db.get_subject(SUBJECT_COMPUTER_SCIENCE.parse().unwrap()).unwrap().unwrap();
        assert_eq!(cs.name, "Computer Science");
        assert_eq!(cs.grade_levels.first(), Some(&6));
    }
}
