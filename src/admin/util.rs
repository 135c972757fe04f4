use std::path::Path;

use crate::db::{Database, OpenOptions};

use crate::admin::error::{AdminError, Result};

/// Opens an existing database for inspection.
///
/// # Errors
///
/// Returns [`AdminError::MissingDatabase`] if nothing exists at `path`, or the decoding
/// error raised while selecting the meta page.
pub fn open_database(path: &Path, opts: &OpenOptions) -> Result<Database> {
    if !path.exists() {
        return Err(AdminError::missing_database(path));
    }
    Ok(Database::open_with(path, *opts)?)
}
