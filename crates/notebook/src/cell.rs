//! Cell model: the envelope shared by both kinds plus kind-specific state.
//!
//! A cell is addressed by its position in the owning notebook; there are no
//! persistent cell IDs. The envelope owns the editable `source` text (the
//! headless stand-in for an editor widget); everything else lives in the
//! kind payload and is discarded when the kind changes.

use crate::error::{Error, Result};
use crate::ipynb::{CellRecord, MimeBundle, OutputRecord, TextPayload};
use crate::markdown;
use serde::{Deserialize, Serialize};

/// Severity of one captured message line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Log,
    Error,
    Debug,
}

/// One console-style message captured during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
}

impl Message {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Message {
            severity,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Code,
    Markdown,
}

/// Kind discriminator plus kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Code {
        /// Times this cell has been run. Starts at 0, +1 per run whether the
        /// run succeeds or fails, never reset.
        execution_count: u32,
        /// Messages captured during the latest run, in call order.
        messages: Vec<Message>,
        /// Rendered representation of the latest result. `None` until the
        /// first successful run and after `clear`.
        output: Option<String>,
    },
    Markdown {
        /// Preview view active (as opposed to the editable source view).
        rendered: bool,
        /// Rendered HTML, present only while `rendered` is set.
        preview: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub source: String,
    pub content: CellContent,
}

impl Cell {
    pub fn new_code() -> Self {
        Cell {
            source: String::new(),
            content: CellContent::Code {
                execution_count: 0,
                messages: Vec::new(),
                output: None,
            },
        }
    }

    pub fn new_markdown() -> Self {
        Cell {
            source: String::new(),
            content: CellContent::Markdown {
                rendered: false,
                preview: None,
            },
        }
    }

    pub fn kind(&self) -> CellKind {
        match self.content {
            CellContent::Code { .. } => CellKind::Code,
            CellContent::Markdown { .. } => CellKind::Markdown,
        }
    }

    /// A new cell of the given kind carrying over the source text only.
    /// Output, messages, and preview state do not survive a kind switch.
    pub fn with_kind(&self, kind: CellKind) -> Cell {
        let mut cell = match kind {
            CellKind::Code => Cell::new_code(),
            CellKind::Markdown => Cell::new_markdown(),
        };
        cell.source = self.source.clone();
        cell
    }

    /// Empty messages and output. Source and execution count are kept.
    /// No-op for markdown cells.
    pub fn clear(&mut self) {
        if let CellContent::Code {
            messages, output, ..
        } = &mut self.content
        {
            messages.clear();
            *output = None;
        }
    }

    /// Render the markdown preview and switch to the preview view.
    /// No-op for code cells.
    pub fn render_markdown(&mut self) {
        if let CellContent::Markdown { rendered, preview } = &mut self.content {
            *preview = Some(markdown::render_html(&self.source));
            *rendered = true;
        }
    }

    /// Discard the preview and return to the editable view. The source is
    /// untouched, so nothing is lost. No-op for code cells.
    pub fn return_to_edit(&mut self) {
        if let CellContent::Markdown { rendered, preview } = &mut self.content {
            *preview = None;
            *rendered = false;
        }
    }

    /// Convert to the persisted record shape. Code cells always write both
    /// output records: the stdout stream with one text entry per message,
    /// and the execute_result with the rendered output (empty when the cell
    /// has none).
    pub fn to_record(&self) -> CellRecord {
        match &self.content {
            CellContent::Code {
                execution_count,
                messages,
                output,
            } => CellRecord::Code {
                execution_count: *execution_count,
                metadata: serde_json::Map::new(),
                source: self.source.clone(),
                outputs: vec![
                    OutputRecord::Stream {
                        name: "stdout".to_string(),
                        text: messages.iter().map(|message| message.text.clone()).collect(),
                    },
                    OutputRecord::ExecuteResult {
                        execution_count: *execution_count,
                        metadata: serde_json::Map::new(),
                        data: MimeBundle {
                            text_plain: Some(TextPayload::Fragments(vec![output
                                .clone()
                                .unwrap_or_default()])),
                        },
                    },
                ],
            },
            CellContent::Markdown { .. } => CellRecord::Markdown {
                metadata: serde_json::Map::new(),
                source: self.source.clone(),
            },
        }
    }

    /// Reconstruct a cell from its persisted record. `index` is the cell's
    /// position in the document, used for error reporting.
    ///
    /// Messages come from stream/stdout records (the format carries no
    /// severity, so they come back as `Log`). The output comes from the
    /// sole `execute_result` record; a code record without one is a corrupt
    /// document and fails with `MissingOutputRecord`. Markdown cells come
    /// back in the preview view, re-rendered from source.
    pub fn from_record(record: CellRecord, index: usize) -> Result<Cell> {
        match record {
            CellRecord::Code {
                execution_count,
                source,
                outputs,
                ..
            } => {
                let messages = outputs
                    .iter()
                    .filter_map(|output| match output {
                        OutputRecord::Stream { name, text } if name == "stdout" => Some(text),
                        _ => None,
                    })
                    .flatten()
                    .map(|text| Message::new(Severity::Log, text.clone()))
                    .collect();

                let data = outputs
                    .iter()
                    .find_map(|output| match output {
                        OutputRecord::ExecuteResult { data, .. } => Some(data),
                        _ => None,
                    })
                    .ok_or(Error::MissingOutputRecord { index })?;
                let rendered = data
                    .text_plain
                    .as_ref()
                    .map(TextPayload::joined)
                    .unwrap_or_default();
                let output = if rendered.is_empty() {
                    None
                } else {
                    Some(rendered)
                };

                Ok(Cell {
                    source,
                    content: CellContent::Code {
                        execution_count,
                        messages,
                        output,
                    },
                })
            }
            CellRecord::Markdown { source, .. } => {
                let mut cell = Cell::new_markdown();
                cell.source = source;
                cell.render_markdown();
                Ok(cell)
            }
        }
    }
}
