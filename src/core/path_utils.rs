/*
 * Locates the per-user directory where persisted explorer state lives.
 * The directory is derived from `directories::ProjectDirs` without an organization
 * qualifier and is created on first use.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/*
 * Retrieves the application's local (non-roaming) configuration directory.
 * The directory comes from `ProjectDirs::config_local_dir` with an empty qualifier and
 * organization, and is created if it does not exist yet.
 *
 * Args:
 * - `app_name`: The application name used as the last path component.
 *
 * Returns:
 * - `Some(PathBuf)` with the existing directory.
 * - `None` if the platform offers no home directory or the directory could not be
 *   created. The creation failure is logged.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", app_name)?;
    let config_path = proj_dirs.config_local_dir();
    if ensure_dir(config_path) {
        Some(config_path.to_path_buf())
    } else {
        None
    }
}

fn ensure_dir(path: &Path) -> bool {
    if path.is_dir() {
        log::trace!("PathUtils: Config directory {path:?} already exists.");
        return true;
    }
    match fs::create_dir_all(path) {
        Ok(()) => {
            log::debug!("PathUtils: Created config directory {path:?}.");
            true
        }
        Err(e) => {
            log::error!("PathUtils: Failed to create config directory {path:?}: {e}");
            false
        }
    }
}
