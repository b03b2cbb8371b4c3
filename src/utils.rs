use log::info;
use std::io;
use std::path::{Path, PathBuf};

const STORAGE_DIR_NAME: &str = "station_archive";

/// Platform data directory for stored datasets, e.g. `~/.local/share/station_archive`.
pub fn default_storage_dir() -> io::Result<PathBuf> {
    dirs::data_dir()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine system data directory",
            )
        })
        .map(|p| p.join(STORAGE_DIR_NAME))
}

/// Like [`default_storage_dir`], falling back to the temp directory.
pub(crate) fn storage_dir_or_temp() -> PathBuf {
    default_storage_dir().unwrap_or_else(|_| std::env::temp_dir().join(STORAGE_DIR_NAME))
}

pub async fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Storage path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating storage directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}
