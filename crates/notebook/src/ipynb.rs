//! The persisted notebook document.
//!
//! An ipynb-shaped JSON dialect: `nbformat` 4.2 with positional cells (no
//! cell IDs), a fixed Rhai kernelspec, and exactly two output records per
//! code cell: one `stream`/`stdout` carrying captured messages and one
//! `execute_result` carrying the rendered output. The types here are a
//! faithful serde model of that wire shape; the in-memory cell model lives
//! in `cell` and converts through `CellRecord`.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const NBFORMAT: u32 = 4;
pub const NBFORMAT_MINOR: u32 = 2;

/// Filename suffix used by every transport (file, store, remote).
pub const FILE_EXTENSION: &str = ".ipynb";

/// A complete persisted notebook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub metadata: DocumentMetadata,
    pub nbformat: u32,
    pub nbformat_minor: u32,
    pub cells: Vec<CellRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub kernelspec: Kernelspec,
    pub language_info: LanguageInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Kernelspec {
    pub display_name: String,
    pub language: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageInfo {
    pub file_extension: String,
    pub mimetype: String,
    pub name: String,
}

impl Default for DocumentMetadata {
    /// The single fixed language identity this format carries.
    fn default() -> Self {
        DocumentMetadata {
            kernelspec: Kernelspec {
                display_name: "Rhai".to_string(),
                language: "rhai".to_string(),
                name: "rhai".to_string(),
            },
            language_info: LanguageInfo {
                file_extension: ".rhai".to_string(),
                mimetype: "text/x-rhai".to_string(),
                name: "rhai".to_string(),
            },
        }
    }
}

/// One persisted cell, tagged by `cell_type`. An unrecognized tag fails the
/// parse of the whole document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cell_type")]
pub enum CellRecord {
    #[serde(rename = "code")]
    Code {
        execution_count: u32,
        #[serde(default)]
        metadata: serde_json::Map<String, serde_json::Value>,
        source: String,
        outputs: Vec<OutputRecord>,
    },
    #[serde(rename = "markdown")]
    Markdown {
        #[serde(default)]
        metadata: serde_json::Map<String, serde_json::Value>,
        source: String,
    },
}

/// One entry of a code cell's `outputs` array, tagged by `output_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "output_type")]
pub enum OutputRecord {
    #[serde(rename = "stream")]
    Stream { name: String, text: Vec<String> },
    #[serde(rename = "execute_result")]
    ExecuteResult {
        execution_count: u32,
        #[serde(default)]
        metadata: serde_json::Map<String, serde_json::Value>,
        data: MimeBundle,
    },
}

/// The `data` bundle of an `execute_result`. Only `text/plain` is carried.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MimeBundle {
    #[serde(rename = "text/plain", default, skip_serializing_if = "Option::is_none")]
    pub text_plain: Option<TextPayload>,
}

/// A `text/plain` payload. Written as a one-element fragment array; both a
/// bare string and a fragment array are accepted on read, since documents
/// in the wild carry either.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TextPayload {
    Fragments(Vec<String>),
    Single(String),
}

impl TextPayload {
    pub fn joined(&self) -> String {
        match self {
            TextPayload::Fragments(fragments) => fragments.concat(),
            TextPayload::Single(text) => text.clone(),
        }
    }
}

impl Document {
    pub fn new(cells: Vec<CellRecord>) -> Self {
        Document {
            metadata: DocumentMetadata::default(),
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
            cells,
        }
    }

    /// Parse a serialized document. Malformed JSON and unknown tags both
    /// surface as `Error::Parse`; the caller's current notebook is never
    /// touched on failure.
    pub fn parse(text: &str) -> Result<Document> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write this document to `path` as JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

/// `<title>.ipynb`, appending the suffix only when missing.
pub fn filename_for(title: &str) -> String {
    if title.ends_with(FILE_EXTENSION) {
        title.to_string()
    } else {
        format!("{title}{FILE_EXTENSION}")
    }
}

/// Strip the `.ipynb` suffix from a filename to recover the title.
pub fn title_for(filename: &str) -> &str {
    filename.strip_suffix(FILE_EXTENSION).unwrap_or(filename)
}

/// Read a document from a file. The title is the filename minus its
/// `.ipynb` suffix.
pub fn open(path: &Path) -> Result<(String, Document)> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let text = std::fs::read_to_string(path)?;
    let document = Document::parse(&text)?;
    Ok((title_for(&filename).to_string(), document))
}
