use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(SCHEMA_V1)?;
    }

    if version < 2 {
        info!("Running migration v2 (catalog seed)");
        conn.execute_batch(SEED_V2)?;
    }

    if version < 3 {
        info!("Running migration v3 (acceptance history)");
        conn.execute_batch(ANSWERS_V3)?;
    }

    info!("Database migrations complete");
    Ok(())
}

// Timestamps are RFC 3339 UTC with milliseconds so chat ordering is stable.
const SCHEMA_V1: &str = "
    CREATE TABLE users (
        id          TEXT PRIMARY KEY,
        email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password    TEXT NOT NULL,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE profiles (
        user_id     TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
        full_name   TEXT NOT NULL,
        bio         TEXT,
        school      TEXT,
        grade       INTEGER,
        points      INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
        avatar_url  TEXT,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE subjects (
        id           TEXT PRIMARY KEY,
        name         TEXT NOT NULL,
        code         TEXT NOT NULL UNIQUE,
        grade_levels TEXT NOT NULL DEFAULT '',
        is_active    INTEGER NOT NULL DEFAULT 1,
        created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE questions (
        id          TEXT PRIMARY KEY,
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        subject_id  TEXT REFERENCES subjects(id) ON DELETE SET NULL,
        title       TEXT NOT NULL,
        content     TEXT NOT NULL,
        difficulty  TEXT NOT NULL DEFAULT 'medium' CHECK (difficulty IN ('easy', 'medium', 'hard')),
        grade_level INTEGER,
        view_count  INTEGER NOT NULL DEFAULT 0,
        upvotes     INTEGER NOT NULL DEFAULT 0,
        is_resolved INTEGER NOT NULL DEFAULT 0,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX idx_questions_user ON questions(user_id);
    CREATE INDEX idx_questions_subject ON questions(subject_id, created_at);

    CREATE TABLE answers (
        id          TEXT PRIMARY KEY,
        question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content     TEXT NOT NULL,
        upvotes     INTEGER NOT NULL DEFAULT 0,
        downvotes   INTEGER NOT NULL DEFAULT 0,
        is_accepted INTEGER NOT NULL DEFAULT 0,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX idx_answers_question ON answers(question_id);
    CREATE INDEX idx_answers_user ON answers(user_id);

    -- At most one accepted answer per question
    CREATE UNIQUE INDEX idx_answers_one_accepted
        ON answers(question_id) WHERE is_accepted = 1;

    CREATE TABLE study_groups (
        id          TEXT PRIMARY KEY,
        creator_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        subject_id  TEXT REFERENCES subjects(id) ON DELETE SET NULL,
        name        TEXT NOT NULL,
        description TEXT,
        privacy     TEXT NOT NULL DEFAULT 'public' CHECK (privacy IN ('public', 'private', 'invite_only')),
        max_members INTEGER NOT NULL DEFAULT 10 CHECK (max_members >= 2),
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE group_members (
        id          TEXT PRIMARY KEY,
        group_id    TEXT NOT NULL REFERENCES study_groups(id) ON DELETE CASCADE,
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role        TEXT NOT NULL DEFAULT 'member' CHECK (role IN ('admin', 'moderator', 'member')),
        joined_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        UNIQUE(group_id, user_id)
    );

    CREATE INDEX idx_group_members_user ON group_members(user_id);

    CREATE TABLE group_invitations (
        group_id    TEXT NOT NULL REFERENCES study_groups(id) ON DELETE CASCADE,
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        invited_by  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        PRIMARY KEY (group_id, user_id)
    );

    CREATE TABLE resources (
        id             TEXT PRIMARY KEY,
        user_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        subject_id     TEXT REFERENCES subjects(id) ON DELETE SET NULL,
        title          TEXT NOT NULL,
        description    TEXT,
        file_url       TEXT NOT NULL,
        file_size      INTEGER NOT NULL DEFAULT 0,
        download_count INTEGER NOT NULL DEFAULT 0,
        rating         REAL NOT NULL DEFAULT 0,
        rating_count   INTEGER NOT NULL DEFAULT 0,
        created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX idx_resources_user ON resources(user_id);

    CREATE TABLE messages (
        id           TEXT PRIMARY KEY,
        group_id     TEXT NOT NULL REFERENCES study_groups(id) ON DELETE CASCADE,
        user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content      TEXT NOT NULL,
        message_type TEXT NOT NULL DEFAULT 'text' CHECK (message_type IN ('text', 'file', 'system')),
        created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX idx_messages_group ON messages(group_id, created_at);

    CREATE TABLE badges (
        id                TEXT PRIMARY KEY,
        name              TEXT NOT NULL UNIQUE,
        description       TEXT NOT NULL,
        icon              TEXT NOT NULL,
        requirement_type  TEXT NOT NULL CHECK (requirement_type IN
            ('points', 'questions_asked', 'answers_given', 'answers_accepted', 'resources_shared')),
        requirement_value INTEGER NOT NULL CHECK (requirement_value > 0)
    );

    CREATE TABLE user_badges (
        user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        badge_id   TEXT NOT NULL REFERENCES badges(id) ON DELETE CASCADE,
        earned_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        PRIMARY KEY (user_id, badge_id)
    );

    CREATE TABLE notifications (
        id          TEXT PRIMARY KEY,
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        type        TEXT NOT NULL CHECK (type IN
            ('question_answered', 'answer_accepted', 'group_invitation', 'resource_shared', 'points_earned')),
        title       TEXT NOT NULL,
        message     TEXT NOT NULL,
        related_id  TEXT,
        is_read     INTEGER NOT NULL DEFAULT 0,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

    -- updated_at maintenance
    CREATE TRIGGER trg_profiles_updated AFTER UPDATE ON profiles
        WHEN NEW.updated_at = OLD.updated_at
        BEGIN
            UPDATE profiles SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE user_id = NEW.user_id;
        END;

    CREATE TRIGGER trg_questions_updated AFTER UPDATE ON questions
        WHEN NEW.updated_at = OLD.updated_at
        BEGIN
            UPDATE questions SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = NEW.id;
        END;

    CREATE TRIGGER trg_answers_updated AFTER UPDATE ON answers
        WHEN NEW.updated_at = OLD.updated_at
        BEGIN
            UPDATE answers SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = NEW.id;
        END;

    CREATE TRIGGER trg_study_groups_updated AFTER UPDATE ON study_groups
        WHEN NEW.updated_at = OLD.updated_at
        BEGIN
            UPDATE study_groups SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = NEW.id;
        END;

    CREATE TRIGGER trg_resources_updated AFTER UPDATE ON resources
        WHEN NEW.updated_at = OLD.updated_at
        BEGIN
            UPDATE resources SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = NEW.id;
        END;

    INSERT INTO schema_version (version) VALUES (1);
";

pub const SUBJECT_MATH: &str = "00000000-0000-0000-0001-000000000001";
pub const SUBJECT_SCIENCE: &str = "00000000-0000-0000-0001-000000000002";
pub const SUBJECT_ENGLISH: &str = "00000000-0000-0000-0001-000000000003";
pub const SUBJECT_SOCIAL_STUDIES: &str = "00000000-0000-0000-0001-000000000004";
pub const SUBJECT_COMPUTER_SCIENCE: &str = "00000000-0000-0000-0001-000000000005";

const SEED_V2: &str = "
    INSERT OR IGNORE INTO subjects (id, name, code, grade_levels) VALUES
        ('00000000-0000-0000-0001-000000000001', 'Mathematics',      'MATH', '1,2,3,4,5,6,7,8,9,10,11,12'),
        ('00000000-0000-0000-0001-000000000002', 'Science',          'SCI',  '1,2,3,4,5,6,7,8,9,10,11,12'),
        ('00000000-0000-0000-0001-000000000003', 'English',          'ENG',  '1,2,3,4,5,6,7,8,9,10,11,12'),
        ('00000000-0000-0000-0001-000000000004', 'Social Studies',   'SS',   '1,2,3,4,5,6,7,8,9,10,11,12'),
        ('00000000-0000-0000-0001-000000000005', 'Computer Science', 'CS',   '6,7,8,9,10,11,12');

    INSERT OR IGNORE INTO badges (id, name, description, icon, requirement_type, requirement_value) VALUES
        ('00000000-0000-0000-0002-000000000001', 'First Question',   'Asked your first question',           'help-circle',  'questions_asked',  1),
        ('00000000-0000-0000-0002-000000000002', 'Curious Mind',     'Asked 10 questions',                  'search',       'questions_asked',  10),
        ('00000000-0000-0000-0002-000000000003', 'Helping Hand',     'Posted your first answer',            'message',      'answers_given',    1),
        ('00000000-0000-0000-0002-000000000004', 'Knowledge Sharer', 'Posted 25 answers',                   'book-open',    'answers_given',    25),
        ('00000000-0000-0000-0002-000000000005', 'Problem Solver',   'Had an answer accepted',              'check-circle', 'answers_accepted', 1),
        ('00000000-0000-0000-0002-000000000006', 'Expert Solver',    'Had 10 answers accepted',             'award',        'answers_accepted', 10),
        ('00000000-0000-0000-0002-000000000007', 'Contributor',      'Shared your first resource',          'upload',       'resources_shared', 1),
        ('00000000-0000-0000-0002-000000000008', 'Librarian',        'Shared 10 resources',                 'archive',      'resources_shared', 10),
        ('00000000-0000-0000-0002-000000000009', 'Rising Star',      'Earned 100 points',                   'star',         'points',           100),
        ('00000000-0000-0000-0002-00000000000a', 'Study Master',     'Earned 500 points',                   'trophy',       'points',           500);

    INSERT INTO schema_version (version) VALUES (2);
";

// Acceptance rewards are paid once per answer; the flag survives a move.
const ANSWERS_V3: &str = "
    ALTER TABLE answers ADD COLUMN accepted_before INTEGER NOT NULL DEFAULT 0;
    UPDATE answers SET accepted_before = 1 WHERE is_accepted = 1;

    INSERT INTO schema_version (version) VALUES (3);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let badges: i64 = conn.query_row("SELECT COUNT(*) FROM badges", [], |r| r.get(0)).unwrap();
        let subjects: i64 = conn.query_row("SELECT COUNT(*) FROM subjects", [], |r| r.get(0)).unwrap();
        assert_eq!(badges, 10);
        assert_eq!(subjects, 5);

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 3);
    }
}
