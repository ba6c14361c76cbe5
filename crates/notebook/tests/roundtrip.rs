//! End-to-end persistence tests: run cells, serialize the notebook, and
//! reload it through the document layer.

use scrawl_notebook::cell::{CellContent, CellKind};
use scrawl_notebook::ipynb::Document;
use scrawl_notebook::notebook::Notebook;
use scrawl_notebook::{Error, NotebookStore};

fn code_state(notebook: &Notebook, index: usize) -> (u32, Vec<String>, Option<String>) {
    match &notebook.cell(index).unwrap().content {
        CellContent::Code {
            execution_count,
            messages,
            output,
        } => (
            *execution_count,
            messages.iter().map(|m| m.text.clone()).collect(),
            output.clone(),
        ),
        CellContent::Markdown { .. } => panic!("expected code cell at {index}"),
    }
}

#[tokio::test]
async fn run_notebook_roundtrips_through_json() {
    let mut notebook = Notebook::new();
    notebook.set_title("demo");
    notebook.add_markdown_cell();
    notebook.add_code_cell();
    notebook.add_code_cell();
    notebook.set_cell_source(0, "# Demo").unwrap();
    notebook.set_cell_source(1, r#"log("hi"); 42"#).unwrap();
    notebook
        .set_cell_source(2, r#"set_global("n", 3); get_global("n") * 2"#)
        .unwrap();
    notebook.run_all().await.unwrap();

    let text = notebook.to_document().to_json_string().unwrap();
    let reloaded = Notebook::from_document("demo", Document::parse(&text).unwrap()).unwrap();

    assert_eq!(reloaded.cells().len(), 3);
    assert_eq!(reloaded.cell(0).unwrap().kind(), CellKind::Markdown);
    assert_eq!(reloaded.cell(0).unwrap().source, "# Demo");
    for index in 1..3 {
        assert_eq!(
            reloaded.cell(index).unwrap().source,
            notebook.cell(index).unwrap().source
        );
        assert_eq!(code_state(&reloaded, index), code_state(&notebook, index));
    }
    assert_eq!(code_state(&reloaded, 1), (1, vec!["hi".to_string()], Some("42".to_string())));
    assert_eq!(code_state(&reloaded, 2).2.as_deref(), Some("6"));
}

#[test]
fn markdown_cell_serializes_to_the_expected_record() {
    let mut notebook = Notebook::new();
    notebook.set_title("demo");
    notebook.add_markdown_cell();
    notebook.set_cell_source(0, "# Hi").unwrap();

    let json = serde_json::to_value(notebook.to_document()).unwrap();
    assert_eq!(
        json["cells"][0],
        serde_json::json!({"cell_type": "markdown", "metadata": {}, "source": "# Hi"})
    );
}

#[test]
fn document_without_execute_result_is_rejected() {
    let text = r#"{
        "metadata": {
            "kernelspec": {"display_name": "Rhai", "language": "rhai", "name": "rhai"},
            "language_info": {"file_extension": ".rhai", "mimetype": "text/x-rhai", "name": "rhai"}
        },
        "nbformat": 4,
        "nbformat_minor": 2,
        "cells": [{
            "cell_type": "code",
            "execution_count": 1,
            "metadata": {},
            "source": "1",
            "outputs": [{"output_type": "stream", "name": "stdout", "text": []}]
        }]
    }"#;
    let document = Document::parse(text).unwrap();
    let result = Notebook::from_document("broken", document);
    assert!(matches!(result, Err(Error::MissingOutputRecord { index: 0 })));
}

#[tokio::test]
async fn stored_notebook_reloads_with_state_intact() {
    let dir = tempfile::tempdir().unwrap();
    let store = NotebookStore::at(dir.path());

    let mut notebook = Notebook::new();
    notebook.set_title("persisted");
    notebook.add_code_cell();
    notebook.set_cell_source(0, "2 + 2").unwrap();
    notebook.run_all().await.unwrap();
    store.store(notebook.title(), &notebook.to_document()).unwrap();

    assert_eq!(store.last_opened().as_deref(), Some("persisted"));
    let reloaded = Notebook::from_document("persisted", store.load("persisted").unwrap()).unwrap();
    assert_eq!(code_state(&reloaded, 0), (1, vec![], Some("4".to_string())));
}
