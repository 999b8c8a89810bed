use duckdb::params;
use r2d2::Pool;
use std::error::Error;
use std::fmt;
use tracing::{debug, error, info};

use crate::db::db_pool::DuckDBConnectionManager;

pub const DEFAULT_FAVORITES: [&str; 8] = [
    "Média de idade dos alunos por série",
    "Distribuição de gêneros por série",
    "Quantidade de alunos beneficiados pelo Bolsa Família",
    "Número de alunos por escola",
    "Percentual de alunos por zona de localização",
    "Contagem de alunos por raça",
    "Lista de bairros com mais matrículas",
    "Comparar inscrições por gênero entre séries",
];

const CREATE_SUGGESTIONS: &str = "
    CREATE SEQUENCE IF NOT EXISTS suggestions_seq;
    CREATE TABLE IF NOT EXISTS suggestions (
        id BIGINT DEFAULT nextval('suggestions_seq'),
        query VARCHAR PRIMARY KEY,
        created_at TIMESTAMP DEFAULT current_timestamp
    );
";

const INSERT_SUGGESTION: &str = "INSERT INTO suggestions (query) VALUES (?) ON CONFLICT (query) DO NOTHING";

#[derive(Debug)]
pub enum FavoritesError {
    InvalidQuery,
    Store(String),
    Pool(String),
}

impl fmt::Display for FavoritesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FavoritesError::InvalidQuery => write!(f, "favorite query must not be blank"),
            FavoritesError::Store(msg) => write!(f, "favorites store error: {}", msg),
            FavoritesError::Pool(msg) => write!(f, "favorites pool error: {}", msg),
        }
    }
}

impl Error for FavoritesError {}

impl From<duckdb::Error> for FavoritesError {
    fn from(err: duckdb::Error) -> Self {
        FavoritesError::Store(err.to_string())
    }
}

impl From<r2d2::Error> for FavoritesError {
    fn from(err: r2d2::Error) -> Self {
        FavoritesError::Pool(err.to_string())
    }
}

/// Saved questions, kept in their own database so the records store can stay read-only.
#[derive(Clone)]
pub struct FavoritesStore {
    pool: Pool<DuckDBConnectionManager>,
}

impl FavoritesStore {
    pub fn new(pool: Pool<DuckDBConnectionManager>) -> Self {
        Self { pool }
    }

    /// Creates the table if needed. Defaults are only seeded into an empty table,
    /// so removed defaults stay removed across restarts.
    pub async fn ensure_schema(&self, seed_defaults: bool) -> Result<(), FavoritesError> {
        self.with_connection(move |conn| {
            conn.execute_batch(CREATE_SUGGESTIONS)?;
            if !seed_defaults {
                return Ok(());
            }

            let existing: i64 = conn.query_row("SELECT COUNT(*) FROM suggestions", [], |row| row.get(0))?;
            if existing == 0 {
                let mut stmt = conn.prepare(INSERT_SUGGESTION)?;
                for query in DEFAULT_FAVORITES {
                    stmt.execute(params![query])?;
                }
                info!("Seeded {} default favorites", DEFAULT_FAVORITES.len());
            }
            Ok(())
        })
        .await
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<String>, FavoritesError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT query FROM suggestions ORDER BY created_at DESC, id DESC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut favorites = Vec::new();
            for row in rows {
                favorites.push(row?);
            }
            Ok(favorites)
        })
        .await
    }

    /// Saving an existing favorite is a no-op.
    pub async fn add(&self, query: &str) -> Result<(), FavoritesError> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(FavoritesError::InvalidQuery);
        }

        self.with_connection(move |conn| {
            let inserted = conn.execute(INSERT_SUGGESTION, params![query])?;
            debug!("Favorite '{}' saved ({} new)", query, inserted);
            Ok(())
        })
        .await
    }

    pub async fn remove(&self, query: &str) -> Result<(), FavoritesError> {
        let query = query.trim().to_string();
        self.with_connection(move |conn| {
            let removed = conn.execute("DELETE FROM suggestions WHERE query = ?", params![query])?;
            debug!("Favorite '{}' removed ({} rows)", query, removed);
            Ok(())
        })
        .await
    }

    pub async fn contains(&self, query: &str) -> Result<bool, FavoritesError> {
        let query = query.trim().to_string();
        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM suggestions WHERE query = ?",
                params![query],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T, FavoritesError>
    where
        T: Send + 'static,
        F: FnOnce(&duckdb::Connection) -> Result<T, FavoritesError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| {
            error!("Favorites task join error: {}", e);
            FavoritesError::Store(format!("Favorites task failed: {}", e))
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::db_pool::memory_pool;
    use pretty_assertions::assert_eq;

    async fn store(seed: bool) -> FavoritesStore {
        let store = FavoritesStore::new(memory_pool());
        store.ensure_schema(seed).await.unwrap();
        store
    }

    #[tokio::test]
    async fn seeds_defaults_once() {
        let store = store(true).await;
        assert_eq!(store.list().await.unwrap().len(), DEFAULT_FAVORITES.len());

        store.remove("Número de alunos por escola").await.unwrap();
        store.ensure_schema(true).await.unwrap();

        let favorites = store.list().await.unwrap();
        assert_eq!(favorites.len(), DEFAULT_FAVORITES.len() - 1);
        assert!(!favorites.contains(&"Número de alunos por escola".to_string()));
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = store(false).await;
        store.add("primeira").await.unwrap();
        store.add("segunda").await.unwrap();
        store.add("terceira").await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["terceira", "segunda", "primeira"]);
    }

    #[tokio::test]
    async fn duplicates_are_ignored() {
        let store = store(false).await;
        store.add("Contagem de alunos por raça").await.unwrap();
        store.add("  Contagem de alunos por raça ").await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["Contagem de alunos por raça"]);
    }

    #[tokio::test]
    async fn blank_is_rejected() {
        let store = store(false).await;
        assert!(matches!(store.add("   ").await, Err(FavoritesError::InvalidQuery)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn contains_tracks_add_and_remove() {
        let store = store(false).await;
        assert!(!store.contains("alunos por bairro").await.unwrap());

        store.add("alunos por bairro").await.unwrap();
        assert!(store.contains("alunos por bairro").await.unwrap());

        store.remove("alunos por bairro").await.unwrap();
        assert!(!store.contains("alunos por bairro").await.unwrap());
    }

    #[tokio::test]
    async fn removing_unknown_is_a_no_op() {
        let store = store(true).await;
        store.remove("não existe").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), DEFAULT_FAVORITES.len());
    }
}
