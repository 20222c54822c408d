use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Where the auction data comes from. A missing source is `Ok(None)`, not an error.
#[cfg_attr(test, mockall::automock)]
pub trait AuctionSource: Send + Sync + 'static {
    /// Modification time of the source, or `None` if it does not exist.
    fn modified(&self) -> Result<Option<SystemTime>, SourceError>;

    /// Full text of the source, or `None` if it does not exist.
    fn read(&self) -> Result<Option<String>, SourceError>;

    /// Human readable location, used in logs and health output.
    fn describe(&self) -> String;
}

/// Saved-variables file on local disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unreadable(&self, source: io::Error) -> SourceError {
        SourceError::Unreadable {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl AuctionSource for FileSource {
    fn modified(&self) -> Result<Option<SystemTime>, SourceError> {
        match fs::metadata(&self.path) {
            Ok(meta) => meta.modified().map(Some).map_err(|e| self.unreadable(e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.unreadable(e)),
        }
    }

    fn read(&self) -> Result<Option<String>, SourceError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    debug!(
                        "{} is not valid UTF-8 (first bad byte at {}), replacing invalid sequences",
                        self.path.display(),
                        e.utf8_error().valid_up_to()
                    );
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.unreadable(e)),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
