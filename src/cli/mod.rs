mod auth;
mod commands;
pub mod credentials;
pub mod http_client;
mod project;

pub use auth::{run_auth_login, run_auth_logout};
pub use commands::{AdminCommands, AuthCommands, ProjectCommands};
pub use project::{run_project_link, run_project_list, run_project_new, run_project_stats};

use std::path::Path;

use crate::store::SqliteStore;

/// Open an existing database, refusing to create one implicitly.
pub fn init_store(db_path: &Path) -> anyhow::Result<SqliteStore> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'waitlist admin init' first.",
            db_path.display()
        );
    }

    SqliteStore::new(db_path).map_err(Into::into)
}
