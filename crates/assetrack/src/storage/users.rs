//! User accounts and server-side sessions.

use chrono::{Duration, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::{parse_column, Storage};
use crate::auth::{new_session_token, Flash, Role, User};
use crate::error::{Error, Result};
use crate::import::ImportRow;

const USER_COLUMNS: &str = "id, username, password_hash, role, is_active, created_at";

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: parse_column(row, 3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Storage {
    /// Create a login account.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank or taken username.
    pub fn create_user(&self, username: &str, password_hash: &str, role: Role) -> Result<User> {
        let username = username.trim();
        if username.is_empty() || username.chars().any(char::is_whitespace) {
            return Err(Error::validation(
                "Username must be non-empty and contain no spaces",
            ));
        }
        if self.find_user(username)?.is_some() {
            return Err(Error::validation(format!("User {username} already exists")));
        }

        self.conn.execute(
            r"
            INSERT INTO users (username, password_hash, role, is_active, created_at)
            VALUES (?1, ?2, ?3, 1, ?4)
            ",
            params![username, password_hash, role.to_string(), Utc::now()],
        )?;
        let id = self.conn.last_insert_rowid();
        info!("Created {} account {}", role, username);

        self.get_user(id)?
            .ok_or_else(|| Error::internal(format!("user {id} vanished after insert")))
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Get a user by login name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_user(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                [username.trim()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// All accounts ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Enable or disable an account. Disabling ends its sessions.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown username.
    pub fn set_user_active(&self, username: &str, active: bool) -> Result<User> {
        let user = self
            .find_user(username)?
            .ok_or_else(|| Error::validation(format!("Unknown user: {}", username.trim())))?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE users SET is_active = ?2 WHERE id = ?1",
            params![user.id, active],
        )?;
        if !active {
            tx.execute("DELETE FROM sessions WHERE user_id = ?1", [user.id])?;
        }
        tx.commit()?;

        info!(
            "{} account {}",
            if active { "Enabled" } else { "Disabled" },
            user.username
        );
        Ok(User {
            is_active: active,
            ..user
        })
    }

    /// Start a session and return its token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn create_session(&self, user_id: i64, ttl: Duration) -> Result<String> {
        let token = new_session_token();
        let now = Utc::now();
        self.conn.execute(
            r"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![token, user_id, now.timestamp(), (now + ttl).timestamp()],
        )?;
        Ok(token)
    }

    /// The active user behind an unexpired session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn session_user(&self, token: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                r"
                SELECT u.id, u.username, u.password_hash, u.role, u.is_active, u.created_at
                FROM sessions s JOIN users u ON u.id = s.user_id
                WHERE s.token = ?1 AND s.expires_at > ?2 AND u.is_active = 1
                ",
                params![token, Utc::now().timestamp()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// End a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM sessions WHERE token = ?1", [token])?;
        Ok(())
    }

    /// Remove expired sessions. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            [Utc::now().timestamp()],
        )?;
        if removed > 0 {
            info!("Purged {} expired sessions", removed);
        }
        Ok(removed)
    }

    /// Queue a message for the next page shown in this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn push_flash(&self, token: &str, flash: Flash) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let stored: Option<String> = tx
            .query_row(
                "SELECT flashes FROM sessions WHERE token = ?1",
                [token],
                |row| row.get(0),
            )
            .optional()?;
        let Some(stored) = stored else {
            debug!("Dropping flash for unknown session");
            return Ok(());
        };

        let mut flashes: Vec<Flash> = serde_json::from_str(&stored)?;
        flashes.push(flash);
        tx.execute(
            "UPDATE sessions SET flashes = ?2 WHERE token = ?1",
            params![token, serde_json::to_string(&flashes)?],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove and return the queued messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn take_flashes(&self, token: &str) -> Result<Vec<Flash>> {
        let tx = self.conn.unchecked_transaction()?;
        let stored: Option<String> = tx
            .query_row(
                "SELECT flashes FROM sessions WHERE token = ?1",
                [token],
                |row| row.get(0),
            )
            .optional()?;
        let flashes: Vec<Flash> = match stored {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        if !flashes.is_empty() {
            tx.execute(
                "UPDATE sessions SET flashes = '[]' WHERE token = ?1",
                [token],
            )?;
        }
        tx.commit()?;
        Ok(flashes)
    }

    /// Keep a checked import batch until it is confirmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_pending_import(&self, token: &str, rows: &[ImportRow]) -> Result<()> {
        self.conn.execute(
            "UPDATE sessions SET pending_import = ?2 WHERE token = ?1",
            params![token, serde_json::to_string(rows)?],
        )?;
        Ok(())
    }

    /// Remove and return the pending import batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn take_pending_import(&self, token: &str) -> Result<Option<Vec<ImportRow>>> {
        let tx = self.conn.unchecked_transaction()?;
        let stored: Option<Option<String>> = tx
            .query_row(
                "SELECT pending_import FROM sessions WHERE token = ?1",
                [token],
                |row| row.get(0),
            )
            .optional()?;
        let rows = match stored.flatten() {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };
        tx.execute(
            "UPDATE sessions SET pending_import = NULL WHERE token = ?1",
            [token],
        )?;
        tx.commit()?;
        Ok(rows)
    }

    /// Whether the session holds an import batch.
    #[cfg(test)]
    pub(crate) fn has_pending_import(&self, token: &str) -> Result<bool> {
        let pending: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE token = ?1 AND pending_import IS NOT NULL)",
            [token],
            |row| row.get(0),
        )?;
        Ok(pending)
    }

    /// Number of accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_users(&self) -> Result<i64> {
        self.count_rows("users")
    }
}
