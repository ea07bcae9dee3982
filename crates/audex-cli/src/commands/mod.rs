pub mod actor;
pub mod history;
pub mod purge;

use audex_store::SqliteLogStore;
use std::path::Path;

/// Open the log database, creating its directory on first use
pub fn open_store(db: &str) -> Result<SqliteLogStore, Box<dyn std::error::Error>> {
    if let Some(parent) = Path::new(db).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(SqliteLogStore::open(db)?)
}
