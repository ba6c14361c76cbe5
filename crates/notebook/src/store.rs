//! Local notebook store.
//!
//! A directory of serialized documents keyed by title, one `<title>.ipynb`
//! file each, plus a marker file remembering the last stored title. Lives
//! under the user's data directory by default:
//! - macOS: ~/Library/Application Support/scrawl/notebooks
//! - Linux: ~/.local/share/scrawl/notebooks
//! - Windows: C:\Users\<User>\AppData\Roaming\scrawl\notebooks

use crate::error::Result;
use crate::ipynb::{self, Document};
use log::debug;
use std::path::PathBuf;

const LAST_OPENED_MARKER: &str = "last-opened";

pub struct NotebookStore {
    root: PathBuf,
}

impl NotebookStore {
    /// Store under the platform data directory.
    pub fn open_default() -> Self {
        let root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scrawl")
            .join("notebooks");
        Self::at(root)
    }

    /// Store rooted at an explicit directory.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        NotebookStore { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Write the document under `<title>.ipynb` and record the title as
    /// last opened.
    pub fn store(&self, title: &str, document: &Document) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.root.join(ipynb::filename_for(title));
        std::fs::write(&path, document.to_json_string()?)?;
        std::fs::write(self.root.join(LAST_OPENED_MARKER), title)?;
        debug!("[store] wrote {:?}", path);
        Ok(())
    }

    /// Read the document stored under `<title>.ipynb`.
    pub fn load(&self, title: &str) -> Result<Document> {
        let path = self.root.join(ipynb::filename_for(title));
        let text = std::fs::read_to_string(&path)?;
        Document::parse(&text)
    }

    /// The most recently stored title, if any.
    pub fn last_opened(&self) -> Option<String> {
        std::fs::read_to_string(self.root.join(LAST_OPENED_MARKER))
            .ok()
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
    }

    /// Titles of every stored notebook, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut titles = Vec::new();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(titles),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().to_string();
            if name.ends_with(ipynb::FILE_EXTENSION) {
                titles.push(ipynb::title_for(&name).to_string());
            }
        }
        titles.sort();
        Ok(titles)
    }
}
