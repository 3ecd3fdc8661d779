//! Synchronous unit-of-work session over one rusqlite connection.
//!
//! # Responsibility
//! - Begin a transaction lazily on the first staged write.
//! - Commit, roll back and close on caller-controlled boundaries.
//! - Apply the scope policy: commit on success, roll back on internal errors.
//!
//! # Invariants
//! - A session never commits implicitly outside `commit()` / `finish()`.
//! - Closing a session with a pending transaction discards that transaction.

use super::migrations::Migration;
use super::open::{open_db, open_db_in_memory};
use super::{DatabaseType, DbError, DbLocation, DbResult};
use log::{debug, error};
use rusqlite::Connection;

/// Error kinds that can ask a session scope to roll back.
pub trait TransactionalError {
    /// Returns `true` for the designated internal error kind.
    fn is_internal(&self) -> bool;
}

impl TransactionalError for DbError {
    fn is_internal(&self) -> bool {
        matches!(self, DbError::Internal(_))
    }
}

/// One unit of work against a SQLite database.
pub struct Session {
    conn: Connection,
}

impl Session {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns whether staged, uncommitted writes may exist.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Opens a transaction unless one is already pending.
    pub(crate) fn begin_write(&self) -> DbResult<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN;")?;
            debug!("event=session_begin module=db status=ok");
        }
        Ok(())
    }

    /// Commits staged writes. No-op when nothing is pending.
    pub fn commit(&self) -> DbResult<()> {
        if self.in_transaction() {
            self.conn.execute_batch("COMMIT;")?;
            debug!("event=session_commit module=db status=ok");
        }
        Ok(())
    }

    /// Discards staged writes. No-op when nothing is pending.
    pub fn rollback(&self) -> DbResult<()> {
        if self.in_transaction() {
            self.conn.execute_batch("ROLLBACK;")?;
            debug!("event=session_rollback module=db status=ok");
        }
        Ok(())
    }

    /// Releases the underlying connection.
    pub fn close(self) -> DbResult<()> {
        self.conn.close().map_err(|(_, err)| DbError::Sqlite(err))
    }

    /// Ends the unit of work according to `result`.
    ///
    /// - `Ok`: commit, then close.
    /// - internal error: log, roll back, close, return the error.
    /// - any other error: close and return the error unchanged.
    pub fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E>
    where
        E: TransactionalError + From<DbError> + std::fmt::Display,
    {
        match result {
            Ok(value) => {
                let committed = self.commit();
                let closed = self.close();
                committed?;
                closed?;
                Ok(value)
            }
            Err(err) if err.is_internal() => {
                error!(
                    "event=session_rollback module=db status=error reason=internal error={}",
                    err
                );
                let _ = self.rollback();
                let _ = self.close();
                Err(err)
            }
            Err(err) => {
                let _ = self.close();
                Err(err)
            }
        }
    }
}

/// Opens sessions against one configured SQLite database.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    location: DbLocation,
    migrations: &'static [Migration],
}

impl SessionFactory {
    /// Creates a factory for `database_url`.
    ///
    /// # Errors
    /// - `DbError::UnsupportedDatabase` for anything but SQLite.
    /// - `DbError::InvalidUrl` when the url cannot be parsed.
    pub fn new(
        database_type: DatabaseType,
        database_url: &str,
        migrations: &'static [Migration],
    ) -> DbResult<Self> {
        database_type.ensure_supported()?;
        let location = DbLocation::parse(database_url)?;
        Ok(Self {
            location,
            migrations,
        })
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    /// Opens a new session. In-memory locations yield a private database per
    /// session.
    pub fn open(&self) -> DbResult<Session> {
        let conn = match &self.location {
            DbLocation::Memory => open_db_in_memory(self.migrations)?,
            DbLocation::File(path) => open_db(path, self.migrations)?,
        };
        Ok(Session::new(conn))
    }

    /// Runs `work` inside a scoped session and finishes it with
    /// [`Session::finish`].
    pub fn with_session<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Session) -> Result<T, E>,
        E: TransactionalError + From<DbError> + std::fmt::Display,
    {
        let session = self.open()?;
        let result = work(&session);
        session.finish(result)
    }
}
