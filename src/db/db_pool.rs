use duckdb::{AccessMode, Config, Connection};
use r2d2::{ManageConnection, Pool};

pub const IN_MEMORY: &str = ":memory:";

pub struct DuckDBConnectionManager {
    connection_string: String,
    read_only: bool,
}

impl DuckDBConnectionManager {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            read_only: false,
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    /// Connections never reach outside their own database: file readers such
    /// as `read_text` or `read_csv`, URL scans and extension loading are off.
    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let config = Config::default().enable_external_access(false)?;
        if self.connection_string == IN_MEMORY {
            return Connection::open_in_memory_with_flags(config);
        }
        let config = if self.read_only {
            config.access_mode(AccessMode::ReadOnly)?
        } else {
            config
        };
        Connection::open_with_flags(&self.connection_string, config)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

pub fn build_pool(
    connection_string: &str,
    pool_size: u32,
    read_only: bool,
) -> Result<Pool<DuckDBConnectionManager>, r2d2::Error> {
    let manager = DuckDBConnectionManager::new(connection_string.to_string()).read_only(read_only);
    // In-memory databases are per connection, so they only make sense unshared
    let max_size = if connection_string == IN_MEMORY { 1 } else { pool_size.max(1) };
    Pool::builder().max_size(max_size).build(manager)
}

/// Single-connection in-memory pool; every checkout sees the same database.
#[cfg(test)]
pub fn memory_pool() -> Pool<DuckDBConnectionManager> {
    build_pool(IN_MEMORY, 1, false).unwrap()
}
