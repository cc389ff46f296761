use crate::error::Result;
use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::{Batch, Connection, Transaction};
use std::ops::Deref;
use std::path::PathBuf;

/// An open, configured connection to one GeoPackage file.
///
/// Obtained from [`GeoPackage::connect`](super::GeoPackage::connect). Call
/// [`Session::finish`] to commit and close. Dropping a session instead closes
/// the handle without committing: SQLite rolls back whatever transaction is
/// still open when the connection goes away.
#[derive(Debug)]
pub struct Session {
    conn: Connection,
    path: PathBuf,
}

impl Session {
    pub(crate) fn new(conn: Connection, path: PathBuf) -> Self {
        Self { conn, path }
    }

    /// Run `f` inside `BEGIN` .. `COMMIT`.
    ///
    /// If `f` fails the transaction is rolled back and the error is returned
    /// unchanged.
    ///
    /// Example:
    /// ```no_run
    /// use gpkg_postprocess::GeoPackage;
    ///
    /// let gpkg = GeoPackage::new("conus_nextgen.gpkg");
    /// let mut session = gpkg.connect()?;
    /// session.transaction(|tx| {
    ///     tx.execute("DELETE FROM hydrolocations WHERE hl_x IS NULL", [])?;
    ///     Ok(())
    /// })?;
    /// session.finish()?;
    /// # Ok::<(), gpkg_postprocess::GpkgError>(())
    /// ```
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(
                        "rollback failed on {}: {rollback_err}",
                        self.path.display()
                    );
                }
                Err(err)
            }
        }
    }

    /// Run every statement of a SQL script in order. Rows returned by
    /// statements such as `SELECT gpkgAddSpatialIndex(..)` are discarded.
    pub fn run_script(&self, sql: &str) -> Result<()> {
        let mut batch = Batch::new(&self.conn, sql);
        while let Some(mut stmt) = batch.next()? {
            let mut rows = stmt.query([])?;
            while rows.next()?.is_some() {}
        }
        Ok(())
    }

    /// Commit pending work and close the connection.
    pub fn finish(self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        self.conn.close().map_err(|(_, err)| err)?;
        Ok(())
    }
}

impl Deref for Session {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}
