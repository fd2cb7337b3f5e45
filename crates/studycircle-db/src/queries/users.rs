use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use studycircle_types::models::{Profile, User};

use super::{OptionalExt, get_timestamp, get_uuid};
use crate::Database;
use crate::models::{ProfileChanges, UserCredentials};

const PROFILE_COLUMNS: &str =
    "user_id, full_name, bio, school, grade, points, avatar_url, created_at, updated_at";

impl Database {
    // -- Users --

    /// Signup: the user row and its profile are created together.
    pub fn create_user_with_profile(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        full_name: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, email, password) VALUES (?1, ?2, ?3)",
                (id.to_string(), email, password_hash),
            )?;
            tx.execute(
                "INSERT INTO profiles (user_id, full_name) VALUES (?1, ?2)",
                (id.to_string(), full_name),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password FROM users WHERE email = ?1",
                [email],
                |row| {
                    Ok(UserCredentials {
                        id: get_uuid(row, 0)?,
                        email: row.get(1)?,
                        password: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, created_at FROM users WHERE id = ?1",
                [id.to_string()],
                |row| {
                    Ok(User {
                        id: get_uuid(row, 0)?,
                        email: row.get(1)?,
                        created_at: get_timestamp(row, 2)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Removes the user and, through foreign keys, every row they own.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    // -- Profiles --

    pub fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        self.with_conn(|conn| query_profile(conn, user_id))
    }

    pub fn update_profile(&self, user_id: Uuid, changes: &ProfileChanges) -> Result<Option<Profile>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE profiles SET
                    full_name = COALESCE(?2, full_name),
                    bio = COALESCE(?3, bio),
                    school = COALESCE(?4, school),
                    grade = COALESCE(?5, grade),
                    avatar_url = COALESCE(?6, avatar_url)
                 WHERE user_id = ?1",
                rusqlite::params![
                    user_id.to_string(),
                    changes.full_name,
                    changes.bio,
                    changes.school,
                    changes.grade,
                    changes.avatar_url,
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_profile(conn, user_id)
        })
    }

    /// Atomically adjust a point total, flooring at zero. Returns the new total.
    pub fn add_points(&self, user_id: Uuid, delta: i64) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "UPDATE profiles SET points = MAX(0, points + ?2) WHERE user_id = ?1 RETURNING points",
                rusqlite::params![user_id.to_string(), delta],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Name shown in notifications; falls back when the profile is gone.
    pub fn display_name(&self, user_id: Uuid) -> Result<String> {
        self.with_conn(|conn| {
            let name: Option<String> = conn
                .query_row(
                    "SELECT full_name FROM profiles WHERE user_id = ?1",
                    [user_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(name.unwrap_or_else(|| "Someone".to_string()))
        })
    }
}

fn query_profile(conn: &Connection, user_id: Uuid) -> Result<Option<Profile>> {
    let sql = format!("SELECT {} FROM profiles WHERE user_id = ?1", PROFILE_COLUMNS);
    conn.query_row(&sql, [user_id.to_string()], map_profile).optional()
}

fn map_profile(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: get_uuid(row, 0)?,
        full_name: row.get(1)?,
        bio: row.get(2)?,
        school: row.get(3)?,
        grade: row.get(4)?,
        points: row.get(5)?,
        avatar_url: row.get(6)?,
        created_at: get_timestamp(row, 7)?,
        updated_at: get_timestamp(row, 8)?,
    })
}
