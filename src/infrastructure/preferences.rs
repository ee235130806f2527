use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Per-install UI preferences. `None` for dark mode means the user never
/// chose and the shell falls back to the OS setting.
pub trait PreferencesRepository: Send + Sync {
    fn load_dark_mode(&self) -> Result<Option<bool>, InfraError>;
    fn save_dark_mode(&self, enabled: bool) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqlitePreferencesRepository {
    db_path: PathBuf,
}

impl SqlitePreferencesRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl PreferencesRepository for SqlitePreferencesRepository {
    fn load_dark_mode(&self) -> Result<Option<bool>, InfraError> {
        let connection = self.connect()?;
        let row: Option<Option<bool>> = connection
            .query_row(
                "SELECT dark_mode FROM ui_preferences WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.flatten())
    }

    fn save_dark_mode(&self, enabled: bool) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO ui_preferences (id, dark_mode, updated_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
               dark_mode = excluded.dark_mode,
               updated_at = excluded.updated_at",
            params![enabled, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPreferencesRepository {
    dark_mode: Mutex<Option<bool>>,
}

impl PreferencesRepository for InMemoryPreferencesRepository {
    fn load_dark_mode(&self) -> Result<Option<bool>, InfraError> {
        let guard = self
            .dark_mode
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("preferences lock poisoned: {error}")))?;
        Ok(*guard)
    }

    fn save_dark_mode(&self, enabled: bool) -> Result<(), InfraError> {
        let mut guard = self
            .dark_mode
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("preferences lock poisoned: {error}")))?;
        *guard = Some(enabled);
        Ok(())
    }
}
