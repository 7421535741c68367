use std::fs;
use std::io;
use std::path::PathBuf;

use crate::document::Document;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Parsing error in {0}: {1}")]
    ParsingError(String, String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

/// Flow documents stored as `<directory>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FlowStore {
    directory: PathBuf,
}

impl FlowStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        return Self {
            directory: directory.into(),
        };
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{}.json", name))
    }

    pub fn read(&self, name: &str) -> Result<Document, Error> {
        let path = self.path(name);

        let contents = match fs::read_to_string(&path) {
            Ok(raw_contents) => Ok(raw_contents),
            Err(error) => match error.kind() {
                io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
                _ => Err(Error::Unknown(error.to_string())),
            },
        }?;

        return serde_json::from_str(&contents).map_err(|error| {
            Error::ParsingError(path.display().to_string(), error.to_string())
        });
    }

    /// Writes the document pretty-printed, creating the directory when needed.
    pub fn write(&self, name: &str, document: &Document) -> Result<(), Error> {
        let unknown = |error: io::Error| Error::Unknown(error.to_string());

        fs::create_dir_all(&self.directory).map_err(unknown)?;

        let file_contents = match serde_json::to_string_pretty(document) {
            Ok(contents) => Ok(contents),
            Err(error) => Err(Error::Unknown(error.to_string())),
        }?;
        fs::write(self.path(name), file_contents).map_err(unknown)?;

        return Ok(());
    }
}
