//! Persistent record of tracked attachments.
//!
//! The ledger is the caller-owned side of the reconciler contract: identities
//! returned by create are recorded here, read and delete drop them again. The
//! file is TOML with one `[attachments."<identity>"]` table per tracked
//! attachment holding the request fields.

use std::collections::BTreeMap;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::toml;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::AttachmentIdentity;
use crate::request::AttachmentRequest;

/// Errors raised while reading or updating the ledger file.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LedgerError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the file is not valid TOML.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the file is TOML but not a ledger.
    #[error("invalid ledger in {path}: {message}")]
    InvalidStructure {
        /// Path that had invalid content.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Storage for identities handed out by the reconciler.
pub trait AttachmentLedger {
    /// Returns the request recorded under `identity`, if tracked.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the ledger cannot be read.
    fn lookup(&self, identity: &AttachmentIdentity)
    -> Result<Option<AttachmentRequest>, LedgerError>;

    /// Records `request` under `identity`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the ledger cannot be read or written.
    fn record(
        &self,
        identity: &AttachmentIdentity,
        request: &AttachmentRequest,
    ) -> Result<(), LedgerError>;

    /// Drops `identity`. Returns whether an entry was removed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the ledger cannot be read or written.
    fn forget(&self, identity: &AttachmentIdentity) -> Result<bool, LedgerError>;
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct LedgerFile {
    #[serde(default)]
    attachments: BTreeMap<AttachmentIdentity, AttachmentRequest>,
}

/// TOML-file ledger.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StateStore {
    path: Utf8PathBuf,
}

impl StateStore {
    /// Builds a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn load(&self) -> Result<LedgerFile, LedgerError> {
        let Some(contents) = read_file(&self.path)? else {
            return Ok(LedgerFile::default());
        };
        if contents.trim().is_empty() {
            return Ok(LedgerFile::default());
        }

        let value: toml::Value = toml::from_str(&contents).map_err(|err| LedgerError::Parse {
            path: self.path.clone(),
            message: err.to_string(),
        })?;
        value
            .try_into()
            .map_err(|err: toml::de::Error| LedgerError::InvalidStructure {
                path: self.path.clone(),
                message: err.to_string(),
            })
    }

    fn store(&self, ledger: &LedgerFile) -> Result<(), LedgerError> {
        let rendered = toml::to_string_pretty(ledger).map_err(|err| LedgerError::Parse {
            path: self.path.clone(),
            message: err.to_string(),
        })?;
        write_file(&self.path, &rendered)
    }
}

impl AttachmentLedger for StateStore {
    fn lookup(
        &self,
        identity: &AttachmentIdentity,
    ) -> Result<Option<AttachmentRequest>, LedgerError> {
        Ok(self.load()?.attachments.remove(identity))
    }

    fn record(
        &self,
        identity: &AttachmentIdentity,
        request: &AttachmentRequest,
    ) -> Result<(), LedgerError> {
        let mut ledger = self.load()?;
        ledger
            .attachments
            .insert(identity.clone(), request.clone());
        self.store(&ledger)
    }

    fn forget(&self, identity: &AttachmentIdentity) -> Result<bool, LedgerError> {
        let mut ledger = self.load()?;
        if ledger.attachments.remove(identity).is_none() {
            return Ok(false);
        }
        self.store(&ledger)?;
        Ok(true)
    }
}

fn split(path: &Utf8Path) -> Result<(&Utf8Path, &str), LedgerError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| LedgerError::InvalidStructure {
            path: path.to_path_buf(),
            message: String::from("ledger path is missing a filename"),
        })?;
    Ok((parent, file_name))
}

fn read_file(path: &Utf8Path) -> Result<Option<String>, LedgerError> {
    let (parent, file_name) = split(path)?;
    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(LedgerError::Io {
                path: parent.to_path_buf(),
                message: err.to_string(),
            });
        }
    };

    match dir.read_to_string(file_name) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(LedgerError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

fn write_file(path: &Utf8Path, contents: &str) -> Result<(), LedgerError> {
    let (parent, file_name) = split(path)?;
    Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| LedgerError::Io {
        path: parent.to_path_buf(),
        message: err.to_string(),
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| LedgerError::Io {
        path: parent.to_path_buf(),
        message: err.to_string(),
    })?;

    dir.write(file_name, contents)
        .map_err(|err| LedgerError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}
