//! Document loading and flushing.
//!
//! The [`DocumentStore`] owns the in-memory [`Document`] and the path it is
//! persisted to. Mutations go through [`DocumentStore::commit`], which stages
//! the change on a copy, writes the whole copy to disk, and only then swaps it
//! in, so memory never runs ahead of what is on disk.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use parley_shared::types::{Chat, Prompt, Settings};

use crate::error::{Result, StoreError};

/// File name of the document inside the data directory.
pub const DOCUMENT_FILE_NAME: &str = "parley.json";

/// The full persisted state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    #[serde(default)]
    pub chats: Vec<Chat>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
    #[serde(default)]
    pub settings: Settings,
}

impl Document {
    /// The state written the first time a store is opened.
    pub fn seeded() -> Self {
        Self {
            chats: Vec::new(),
            prompts: vec![
                Prompt::new(
                    "Code Review",
                    "Please review this code and suggest improvements:",
                ),
                Prompt::new(
                    "Content Summary",
                    "Summarize the following content in bullet points:",
                ),
            ],
            settings: Settings::default(),
        }
    }
}

/// Whole-document JSON store.
pub struct DocumentStore {
    path: PathBuf,
    data: Document,
}

impl DocumentStore {
    /// Open (or create) the default document.
    ///
    /// The file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/parley/parley.json`
    /// - macOS:   `~/Library/Application Support/com.parley.parley/parley.json`
    /// - Windows: `{FOLDERID_RoamingAppData}\parley\parley\data\parley.json`
    pub fn open_default() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "parley", "parley").ok_or(StoreError::NoDataDir)?;

        let path = project_dirs.data_dir().join(DOCUMENT_FILE_NAME);
        Self::open_at(&path)
    }

    /// Open (or create) a document at an explicit path.
    ///
    /// A missing file is seeded with [`Document::seeded`] and written
    /// immediately.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %path.display(), "opening document store");

        if path.exists() {
            let raw = fs::read(path)?;
            let data: Document = serde_json::from_slice(&raw)?;
            tracing::debug!(
                chats = data.chats.len(),
                prompts = data.prompts.len(),
                "document loaded"
            );
            return Ok(Self {
                path: path.to_path_buf(),
                data,
            });
        }

        let store = Self {
            path: path.to_path_buf(),
            data: Document::seeded(),
        };
        write_document(&store.path, &store.data)?;
        tracing::info!("seeded new document");
        Ok(store)
    }

    /// Filesystem path of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only view of the in-memory document.
    pub fn document(&self) -> &Document {
        &self.data
    }

    /// Apply `mutate` to a copy of the document, persist the copy in full,
    /// then make it current.
    ///
    /// If `mutate` or the write fails, the store is left exactly as it was.
    pub(crate) fn commit<T, F>(&mut self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Document) -> Result<T>,
    {
        let mut staged = self.data.clone();
        let out = mutate(&mut staged)?;
        write_document(&self.path, &staged)?;
        self.data = staged;
        Ok(out)
    }
}

/// Write `data` to a sibling temp file and rename it over `path`.
fn write_document(path: &Path, data: &Document) -> Result<()> {
    let json = serde_json::to_vec_pretty(data)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
