//! The notebook: an ordered sequence of cells plus title and shared
//! evaluation context.
//!
//! Cells are addressed positionally; structural edits shift later indices.
//! `run_cell` and `run_all` take `&mut self`, so two runs can never overlap
//! on one notebook: the exclusive borrow is the run lock.

use crate::cell::{Cell, CellContent, CellKind, Message, Severity};
use crate::error::{Error, Result};
use crate::evaluator::{self, MessageSink, SharedGlobals};
use crate::ipynb::Document;
use crate::value::Value;
use log::debug;
use std::collections::BTreeMap;

/// Placeholder title until the user picks one.
pub const DEFAULT_TITLE: &str = "Notebook Title";

pub struct Notebook {
    title: String,
    cells: Vec<Cell>,
    /// Named bindings injected into every code cell's evaluation scope.
    /// Fixed for the notebook's lifetime.
    context: BTreeMap<String, Value>,
    globals: SharedGlobals,
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new()
    }
}

impl Notebook {
    pub fn new() -> Self {
        Self::with_context(BTreeMap::new())
    }

    pub fn with_context(context: BTreeMap<String, Value>) -> Self {
        Notebook {
            title: DEFAULT_TITLE.to_string(),
            cells: Vec::new(),
            context,
            globals: evaluator::new_shared_globals(),
        }
    }

    /// A fresh notebook with a single empty code cell, the state every
    /// newly opened notebook starts in.
    pub fn new_empty() -> Self {
        let mut notebook = Self::new();
        notebook.add_code_cell();
        notebook
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Append a new default code cell; returns its index.
    pub fn add_code_cell(&mut self) -> usize {
        self.cells.push(Cell::new_code());
        self.cells.len() - 1
    }

    /// Append a new default markdown cell; returns its index.
    pub fn add_markdown_cell(&mut self) -> usize {
        self.cells.push(Cell::new_markdown());
        self.cells.len() - 1
    }

    /// Insert a new default code cell immediately before the cell at
    /// `index`; returns the new cell's index.
    pub fn insert_code_cell_above(&mut self, index: usize) -> Result<usize> {
        self.ensure_cell(index)?;
        self.cells.insert(index, Cell::new_code());
        Ok(index)
    }

    /// Insert a new default code cell immediately after the cell at
    /// `index`; returns the new cell's index.
    pub fn insert_code_cell_below(&mut self, index: usize) -> Result<usize> {
        self.ensure_cell(index)?;
        self.cells.insert(index + 1, Cell::new_code());
        Ok(index + 1)
    }

    /// Remove and drop the cell at `index`. Later cells shift down.
    pub fn remove_cell(&mut self, index: usize) -> Result<()> {
        self.ensure_cell(index)?;
        self.cells.remove(index);
        Ok(())
    }

    /// Rebuild the cell at `index` as the given kind, carrying over its
    /// source only. A no-op when the cell already has that kind.
    pub fn set_cell_kind(&mut self, index: usize, kind: CellKind) -> Result<()> {
        let cell = self.cells.get_mut(index).ok_or(Error::NoSuchCell { index })?;
        if cell.kind() != kind {
            *cell = cell.with_kind(kind);
        }
        Ok(())
    }

    /// Replace the cell's source text (the editor write-back path).
    pub fn set_cell_source(&mut self, index: usize, source: impl Into<String>) -> Result<()> {
        let cell = self.cells.get_mut(index).ok_or(Error::NoSuchCell { index })?;
        cell.source = source.into();
        Ok(())
    }

    /// Switch a markdown cell back to its editable view.
    pub fn return_cell_to_edit(&mut self, index: usize) -> Result<()> {
        let cell = self.cells.get_mut(index).ok_or(Error::NoSuchCell { index })?;
        cell.return_to_edit();
        Ok(())
    }

    /// Run one cell.
    ///
    /// Markdown cells render their preview. Code cells clear messages and
    /// output, increment the execution count, and evaluate their source
    /// with the notebook context plus a `cell` binding in scope. The error
    /// policy is propagate-then-contain: the evaluator rejects on any
    /// script error, and this method contains it: the error becomes the
    /// last message line, the output stays cleared, the count keeps its
    /// increment, and `Ok(())` is returned. `Err` only means the index was
    /// out of range.
    pub async fn run_cell(&mut self, index: usize) -> Result<()> {
        let cell = self.cells.get_mut(index).ok_or(Error::NoSuchCell { index })?;
        match &mut cell.content {
            CellContent::Markdown { .. } => {
                cell.render_markdown();
                Ok(())
            }
            CellContent::Code {
                execution_count,
                messages,
                output,
            } => {
                messages.clear();
                *output = None;
                *execution_count += 1;
                let count = *execution_count;
                debug!("[run] cell {} execution {}", index, count);

                let mut bindings = self.context.clone();
                bindings.insert(
                    "cell".to_string(),
                    Value::Structured(serde_json::json!({
                        "index": index,
                        "execution_count": count,
                    })),
                );

                let sink = MessageSink::new();
                let result = evaluator::evaluate(
                    &cell.source,
                    &bindings,
                    self.globals.clone(),
                    sink.clone(),
                )
                .await;

                let mut captured = sink.drain();
                match result {
                    Ok(value) => {
                        *output = Some(value.render());
                    }
                    Err(err) => {
                        debug!("[run] cell {} failed: {}", index, err);
                        captured.push(Message::new(Severity::Error, err.to_string()));
                    }
                }
                *messages = captured;
                Ok(())
            }
        }
    }

    /// Run every cell in sequence order, each awaited to completion before
    /// the next starts, so later cells observe globals written by earlier
    /// ones. Cell failures are contained per cell; the sweep always
    /// completes.
    pub async fn run_all(&mut self) -> Result<()> {
        for index in 0..self.cells.len() {
            self.run_cell(index).await?;
        }
        Ok(())
    }

    /// Clear messages and output on every code cell. Markdown cells are
    /// unaffected.
    pub fn clear_outputs(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    pub fn to_document(&self) -> Document {
        Document::new(self.cells.iter().map(Cell::to_record).collect())
    }

    pub fn from_document(title: impl Into<String>, document: Document) -> Result<Self> {
        Self::from_document_with_context(title, document, BTreeMap::new())
    }

    /// Rebuild a notebook strictly in document order, dispatching each
    /// record by its `cell_type`. Fails on the first bad record, leaving no
    /// partially built notebook behind.
    pub fn from_document_with_context(
        title: impl Into<String>,
        document: Document,
        context: BTreeMap<String, Value>,
    ) -> Result<Self> {
        let mut cells = Vec::with_capacity(document.cells.len());
        for (index, record) in document.cells.into_iter().enumerate() {
            cells.push(Cell::from_record(record, index)?);
        }
        Ok(Notebook {
            title: title.into(),
            cells,
            context,
            globals: evaluator::new_shared_globals(),
        })
    }

    fn ensure_cell(&self, index: usize) -> Result<()> {
        if index < self.cells.len() {
            Ok(())
        } else {
            Err(Error::NoSuchCell { index })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execution_count(notebook: &Notebook, index: usize) -> u32 {
        match &notebook.cell(index).unwrap().content {
            CellContent::Code {
                execution_count, ..
            } => *execution_count,
            CellContent::Markdown { .. } => panic!("expected code cell"),
        }
    }

    fn output(notebook: &Notebook, index: usize) -> Option<String> {
        match &notebook.cell(index).unwrap().content {
            CellContent::Code { output, .. } => output.clone(),
            CellContent::Markdown { .. } => panic!("expected code cell"),
        }
    }

    fn messages(notebook: &Notebook, index: usize) -> Vec<Message> {
        match &notebook.cell(index).unwrap().content {
            CellContent::Code { messages, .. } => messages.clone(),
            CellContent::Markdown { .. } => panic!("expected code cell"),
        }
    }

    #[test]
    fn test_new_notebook_has_placeholder_title() {
        let notebook = Notebook::new();
        assert_eq!(notebook.title(), DEFAULT_TITLE);
        assert!(notebook.cells().is_empty());
    }

    #[test]
    fn test_new_empty_has_single_code_cell() {
        let notebook = Notebook::new_empty();
        assert_eq!(notebook.cells().len(), 1);
        assert_eq!(notebook.cell(0).unwrap().kind(), CellKind::Code);
    }

    #[test]
    fn test_add_cells_appends_in_order() {
        let mut notebook = Notebook::new();
        assert_eq!(notebook.add_code_cell(), 0);
        assert_eq!(notebook.add_markdown_cell(), 1);
        assert_eq!(notebook.cell(0).unwrap().kind(), CellKind::Code);
        assert_eq!(notebook.cell(1).unwrap().kind(), CellKind::Markdown);
    }

    #[test]
    fn test_insert_above_shifts_existing_cell() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.set_cell_source(0, "original").unwrap();

        let inserted = notebook.insert_code_cell_above(0).unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(notebook.cells().len(), 2);
        assert!(notebook.cell(0).unwrap().source.is_empty());
        assert_eq!(notebook.cell(1).unwrap().source, "original");
    }

    #[test]
    fn test_insert_below_lands_after_cell() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.add_code_cell();
        notebook.set_cell_source(0, "first").unwrap();

        let inserted = notebook.insert_code_cell_below(0).unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(notebook.cells().len(), 3);
        assert_eq!(notebook.cell(0).unwrap().source, "first");
        assert!(notebook.cell(1).unwrap().source.is_empty());
    }

    #[test]
    fn test_remove_cell_drops_it() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.add_code_cell();
        notebook.set_cell_source(1, "keep").unwrap();

        notebook.remove_cell(0).unwrap();
        assert_eq!(notebook.cells().len(), 1);
        assert_eq!(notebook.cell(0).unwrap().source, "keep");
    }

    #[test]
    fn test_structural_edits_reject_bad_index() {
        let mut notebook = Notebook::new();
        assert!(matches!(
            notebook.remove_cell(0),
            Err(Error::NoSuchCell { index: 0 })
        ));
        assert!(notebook.insert_code_cell_above(0).is_err());
        assert!(notebook.insert_code_cell_below(0).is_err());
        assert!(notebook.set_cell_kind(0, CellKind::Markdown).is_err());
    }

    #[test]
    fn test_set_cell_kind_replaces_in_place() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.set_cell_source(0, "# Hi").unwrap();

        notebook.set_cell_kind(0, CellKind::Markdown).unwrap();
        assert_eq!(notebook.cell(0).unwrap().kind(), CellKind::Markdown);
        assert_eq!(notebook.cell(0).unwrap().source, "# Hi");
    }

    #[tokio::test]
    async fn test_run_sets_count_messages_and_output() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.set_cell_source(0, r#"log("hi"); 42"#).unwrap();

        notebook.run_cell(0).await.unwrap();

        assert_eq!(execution_count(&notebook, 0), 1);
        assert_eq!(messages(&notebook, 0), vec![Message::new(Severity::Log, "hi")]);
        assert_eq!(output(&notebook, 0).as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_execution_count_increments_on_failure_too() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.set_cell_source(0, "nope()").unwrap();

        notebook.run_cell(0).await.unwrap();
        notebook.run_cell(0).await.unwrap();

        assert_eq!(execution_count(&notebook, 0), 2);
    }

    #[tokio::test]
    async fn test_failed_run_contains_error_as_message() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.set_cell_source(0, r#"log("before"); nope()"#).unwrap();

        notebook.run_cell(0).await.unwrap();

        let captured = messages(&notebook, 0);
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0], Message::new(Severity::Log, "before"));
        assert_eq!(captured[1].severity, Severity::Error);
        assert!(output(&notebook, 0).is_none());
    }

    #[tokio::test]
    async fn test_previous_messages_do_not_survive_a_new_run() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.set_cell_source(0, r#"log("first"); 1"#).unwrap();
        notebook.run_cell(0).await.unwrap();

        notebook.set_cell_source(0, r#"log("second"); 2"#).unwrap();
        notebook.run_cell(0).await.unwrap();

        assert_eq!(
            messages(&notebook, 0),
            vec![Message::new(Severity::Log, "second")]
        );
        assert_eq!(output(&notebook, 0).as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_context_bindings_reach_the_cell() {
        let mut context = BTreeMap::new();
        context.insert("base".to_string(), Value::Int(40));
        let mut notebook = Notebook::with_context(context);
        notebook.add_code_cell();
        notebook.set_cell_source(0, "base + 2").unwrap();

        notebook.run_cell(0).await.unwrap();
        assert_eq!(output(&notebook, 0).as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_cell_binding_carries_position_and_count() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.set_cell_source(0, "cell.execution_count").unwrap();

        notebook.run_cell(0).await.unwrap();
        assert_eq!(output(&notebook, 0).as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_run_all_is_strictly_sequential() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.add_code_cell();
        notebook.set_cell_source(0, r#"set_global("x", 1); ()"#).unwrap();
        notebook.set_cell_source(1, r#"get_global("x") + 1"#).unwrap();

        notebook.run_all().await.unwrap();
        assert_eq!(output(&notebook, 1).as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_run_all_matches_manual_order() {
        let mut manual = Notebook::new();
        manual.add_code_cell();
        manual.add_code_cell();
        manual.set_cell_source(0, r#"set_global("x", 10); ()"#).unwrap();
        manual.set_cell_source(1, r#"get_global("x") * 2"#).unwrap();
        manual.run_cell(0).await.unwrap();
        manual.run_cell(1).await.unwrap();

        let mut swept = Notebook::new();
        swept.add_code_cell();
        swept.add_code_cell();
        swept.set_cell_source(0, r#"set_global("x", 10); ()"#).unwrap();
        swept.set_cell_source(1, r#"get_global("x") * 2"#).unwrap();
        swept.run_all().await.unwrap();

        assert_eq!(output(&manual, 1), output(&swept, 1));
    }

    #[tokio::test]
    async fn test_run_all_continues_past_a_failing_cell() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.add_code_cell();
        notebook.set_cell_source(0, "nope()").unwrap();
        notebook.set_cell_source(1, "7").unwrap();

        notebook.run_all().await.unwrap();

        assert_eq!(execution_count(&notebook, 0), 1);
        assert_eq!(output(&notebook, 1).as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_run_all_renders_markdown_cells() {
        let mut notebook = Notebook::new();
        notebook.add_markdown_cell();
        notebook.set_cell_source(0, "# Hi").unwrap();

        notebook.run_all().await.unwrap();

        let CellContent::Markdown { rendered, preview } = &notebook.cell(0).unwrap().content
        else {
            panic!("expected markdown cell");
        };
        assert!(*rendered);
        assert!(preview.as_ref().unwrap().contains("<h1>Hi</h1>"));
    }

    #[tokio::test]
    async fn test_clear_outputs_spares_markdown_and_counts() {
        let mut notebook = Notebook::new();
        notebook.add_code_cell();
        notebook.add_markdown_cell();
        notebook.set_cell_source(0, r#"log("hi"); 1"#).unwrap();
        notebook.set_cell_source(1, "# Hi").unwrap();
        notebook.run_all().await.unwrap();

        notebook.clear_outputs();

        assert_eq!(execution_count(&notebook, 0), 1);
        assert!(messages(&notebook, 0).is_empty());
        assert!(output(&notebook, 0).is_none());
        let CellContent::Markdown { rendered, .. } = &notebook.cell(1).unwrap().content else {
            panic!("expected markdown cell");
        };
        assert!(*rendered);
    }
}
