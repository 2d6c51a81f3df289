use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use uuid::Uuid;

use super::Store;
use super::procedure::{
    RejectReason, SignupProcedure, SignupSubmission, SubmitReply, is_valid_email,
    is_valid_source, next_attempt,
};
use super::schema::SCHEMA;
use crate::config::SignupLimits;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    limits: SignupLimits,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
            limits: SignupLimits::default(),
        })
    }

    #[must_use]
    pub fn with_limits(mut self, limits: SignupLimits) -> Self {
        self.limits = limits;
        self
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn submit_signup_at(
        &self,
        submission: &SignupSubmission,
        now: DateTime<Utc>,
    ) -> Result<SubmitReply> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let project_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
            params![submission.project_id],
            |row| row.get(0),
        )?;
        if !project_exists {
            return Ok(SubmitReply::rejected(RejectReason::ProjectNotFound));
        }

        if let Some(ip) = submission.ip_address.as_deref() {
            let existing = tx
                .query_row(
                    "SELECT project_id, ip_address, attempt_count, last_attempt_at
                     FROM signup_attempts WHERE project_id = ?1 AND ip_address = ?2",
                    params![submission.project_id, ip],
                    row_to_attempt,
                )
                .optional()?;

            let (attempt, allowed) =
                next_attempt(existing.as_ref(), &submission.project_id, ip, now, self.limits);

            tx.execute(
                "INSERT INTO signup_attempts (project_id, ip_address, attempt_count, last_attempt_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(project_id, ip_address) DO UPDATE SET
                     attempt_count = excluded.attempt_count,
                     last_attempt_at = excluded.last_attempt_at",
                params![
                    attempt.project_id,
                    attempt.ip_address,
                    attempt.attempt_count,
                    format_datetime(&attempt.last_attempt_at),
                ],
            )?;

            if !allowed {
                tx.commit()?;
                return Ok(SubmitReply::rejected(RejectReason::RateLimited));
            }
        }

        let reply = insert_signup(&tx, submission, now)?;
        tx.commit()?;
        Ok(reply)
    }
}

fn insert_signup(
    tx: &Transaction<'_>,
    submission: &SignupSubmission,
    now: DateTime<Utc>,
) -> Result<SubmitReply> {
    if !is_valid_email(&submission.email) {
        return Ok(SubmitReply::rejected(RejectReason::InvalidEmail));
    }
    if !is_valid_source(&submission.source) {
        return Ok(SubmitReply::rejected(RejectReason::InvalidSource));
    }

    let duplicate: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM signups WHERE project_id = ?1 AND email = ?2)",
        params![submission.project_id, submission.email],
        |row| row.get(0),
    )?;
    if duplicate {
        return Ok(SubmitReply::rejected(RejectReason::Duplicate));
    }

    let result = tx.execute(
        "INSERT INTO signups (id, project_id, email, source, ip_address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            submission.project_id,
            submission.email,
            submission.source,
            submission.ip_address,
            format_datetime(&now),
        ],
    );

    match result {
        Ok(_) => Ok(SubmitReply::accepted()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(SubmitReply::rejected(RejectReason::Duplicate))
        }
        Err(e) => Err(Error::from(e)),
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_datetime)
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn row_to_owner(row: &Row<'_>) -> rusqlite::Result<Owner> {
    Ok(Owner {
        id: row.get(0)?,
        email: row.get(1)?,
        created_at: parse_datetime(&row.get::<_, String>(2)?),
    })
}

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        owner_id: row.get(3)?,
        created_at: parse_optional_datetime(row.get(4)?),
    })
}

fn row_to_signup(row: &Row<'_>) -> rusqlite::Result<Signup> {
    Ok(Signup {
        id: row.get(0)?,
        project_id: row.get(1)?,
        email: row.get(2)?,
        source: row.get(3)?,
        ip_address: row.get(4)?,
        created_at: parse_optional_datetime(row.get(5)?),
    })
}

fn row_to_attempt(row: &Row<'_>) -> rusqlite::Result<SignupAttempt> {
    Ok(SignupAttempt {
        project_id: row.get(0)?,
        ip_address: row.get(1)?,
        attempt_count: row.get(2)?,
        last_attempt_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn row_to_magic_link(row: &Row<'_>) -> rusqlite::Result<MagicLink> {
    Ok(MagicLink {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        token_hash: row.get(2)?,
        token_lookup: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        expires_at: parse_datetime(&row.get::<_, String>(5)?),
        consumed_at: parse_optional_datetime(row.get(6)?),
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        token_hash: row.get(2)?,
        token_lookup: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        expires_at: parse_datetime(&row.get::<_, String>(5)?),
        last_used_at: parse_optional_datetime(row.get(6)?),
    })
}

impl SignupProcedure for SqliteStore {
    fn submit_signup(&self, submission: &SignupSubmission) -> Result<SubmitReply> {
        self.submit_signup_at(submission, Utc::now())
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Owner operations

    fn create_owner(&self, owner: &Owner) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO owners (id, email, created_at) VALUES (?1, ?2, ?3)",
            params![owner.id, owner.email, format_datetime(&owner.created_at)],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_owner(&self, id: &str) -> Result<Option<Owner>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, email, created_at FROM owners WHERE id = ?1",
            params![id],
            row_to_owner,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_owner_by_email(&self, email: &str) -> Result<Option<Owner>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, email, created_at FROM owners WHERE email = ?1",
            params![email],
            row_to_owner,
        )
        .optional()
        .map_err(Error::from)
    }

    fn has_owner(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM owners", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    // Magic link operations

    fn create_magic_link(&self, link: &MagicLink) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO magic_links (id, owner_id, token_hash, token_lookup, created_at, expires_at, consumed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                link.id,
                link.owner_id,
                link.token_hash,
                link.token_lookup,
                format_datetime(&link.created_at),
                format_datetime(&link.expires_at),
                link.consumed_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::TokenLookupCollision)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_magic_link_by_lookup(&self, lookup: &str) -> Result<Option<MagicLink>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, token_hash, token_lookup, created_at, expires_at, consumed_at
             FROM magic_links WHERE token_lookup = ?1",
            params![lookup],
            row_to_magic_link,
        )
        .optional()
        .map_err(Error::from)
    }

    fn consume_magic_link(&self, id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE magic_links SET consumed_at = ?1 WHERE id = ?2 AND consumed_at IS NULL",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(rows > 0)
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO sessions (id, owner_id, token_hash, token_lookup, created_at, expires_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id,
                session.owner_id,
                session.token_hash,
                session.token_lookup,
                format_datetime(&session.created_at),
                format_datetime(&session.expires_at),
                session.last_used_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::TokenLookupCollision)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, token_hash, token_lookup, created_at, expires_at, last_used_at
             FROM sessions WHERE token_lookup = ?1",
            params![lookup],
            row_to_session,
        )
        .optional()
        .map_err(Error::from)
    }

    fn touch_session(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Project operations

    fn create_project(&self, project: &Project) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let burned: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM burned_slugs WHERE slug = ?1)",
            params![project.slug],
            |row| row.get(0),
        )?;
        if burned {
            return Err(Error::AlreadyExists);
        }

        let result = tx.execute(
            "INSERT INTO projects (id, name, slug, owner_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                project.id,
                project.name,
                project.slug,
                project.owner_id,
                project.created_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(Error::AlreadyExists);
            }
            Err(e) => return Err(Error::from(e)),
        }

        tx.execute(
            "INSERT INTO burned_slugs (slug) VALUES (?1)",
            params![project.slug],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn is_slug_available(&self, slug: &str) -> Result<bool> {
        let conn = self.conn();
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE slug = ?1)
                 OR EXISTS(SELECT 1 FROM burned_slugs WHERE slug = ?1)",
            params![slug],
            |row| row.get(0),
        )?;
        Ok(!taken)
    }

    fn get_project_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, slug, owner_id, created_at FROM projects WHERE slug = ?1",
            params![slug],
            row_to_project,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_owned_project(&self, owner_id: &str, id: &str) -> Result<Option<Project>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, slug, owner_id, created_at
             FROM projects WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
            row_to_project,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_owned_projects(&self, owner_id: &str) -> Result<Vec<Project>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, slug, owner_id, created_at
             FROM projects WHERE owner_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map(params![owner_id], row_to_project)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Signup reads

    fn list_project_signups(&self, owner_id: &str, project_id: &str) -> Result<Vec<Signup>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.project_id, s.email, s.source, s.ip_address, s.created_at
             FROM signups s
             JOIN projects p ON p.id = s.project_id
             WHERE s.project_id = ?1 AND p.owner_id = ?2
             ORDER BY s.rowid",
        )?;

        let rows = stmt.query_map(params![project_id, owner_id], row_to_signup)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_owner_signups(&self, owner_id: &str) -> Result<Vec<Signup>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.project_id, s.email, s.source, s.ip_address, s.created_at
             FROM signups s
             JOIN projects p ON p.id = s.project_id
             WHERE p.owner_id = ?1
             ORDER BY s.rowid",
        )?;

        let rows = stmt.query_map(params![owner_id], row_to_signup)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn get_signup_attempt(&self, project_id: &str, ip_address: &str) -> Result<Option<SignupAttempt>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT project_id, ip_address, attempt_count, last_attempt_at
             FROM signup_attempts WHERE project_id = ?1 AND ip_address = ?2",
            params![project_id, ip_address],
            row_to_attempt,
        )
        .optional()
        .map_err(Error::from)
    }
}
