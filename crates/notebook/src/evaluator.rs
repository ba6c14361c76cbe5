//! Scoped Rhai evaluation for code cells.
//!
//! Each call builds a fresh engine (Rhai ASTs are not kept across calls),
//! pushes the caller's named bindings into the scope, and wires the
//! console-style functions (`log`, `info`, `warn`, `error`, plus the
//! built-in `print`/`debug` hooks) to a per-call [`MessageSink`]. The sink
//! replaces any process-global output redirection: it lives exactly as long
//! as the call, so capture cannot leak between cells and release needs no
//! manual restore step on either exit path.
//!
//! Cross-cell state goes through [`SharedGlobals`], reachable from scripts
//! via `set_global`/`get_global`. Cells run strictly one at a time (the
//! notebook holds `&mut self` across the await), so later cells observe
//! globals written by earlier ones.

use crate::cell::{Message, Severity};
use crate::value::{HtmlElement, Value};
use rhai::{Dynamic, Engine, Scope};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Hard ceiling on script operations, so a non-terminating cell body fails
/// instead of wedging the notebook.
const MAX_OPERATIONS: u64 = 1_000_000;

/// A failed evaluation. Always propagated to the caller; the evaluator
/// never swallows script errors.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct EvalError {
    pub message: String,
}

/// Append-only message capture for one evaluation call.
#[derive(Debug, Clone, Default)]
pub struct MessageSink(Arc<Mutex<Vec<Message>>>);

impl MessageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, severity: Severity, text: impl Into<String>) {
        self.0
            .lock()
            .unwrap()
            .push(Message::new(severity, text.into()));
    }

    /// Take every captured message, in capture order.
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Mutable name→value store shared by every cell of a notebook; the
/// headless analog of the global object cells used to mutate.
pub type SharedGlobals = Arc<Mutex<BTreeMap<String, Value>>>;

pub fn new_shared_globals() -> SharedGlobals {
    Arc::new(Mutex::new(BTreeMap::new()))
}

/// Evaluate `source` with `bindings` visible as free variables. The script
/// sees the bindings, the registered builtins, and nothing else from the
/// caller's scope. Runs on a blocking thread; the caller suspends until the
/// evaluation settles.
pub async fn evaluate(
    source: &str,
    bindings: &BTreeMap<String, Value>,
    globals: SharedGlobals,
    sink: MessageSink,
) -> Result<Value, EvalError> {
    let source = source.to_string();
    let bindings = bindings.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let engine = build_engine(globals, sink);
        let mut scope = Scope::new();
        for (name, value) in &bindings {
            scope.push_constant_dynamic(name.as_str(), value.to_dynamic());
        }
        engine
            .eval_with_scope::<Dynamic>(&mut scope, &source)
            .map(Value::from_dynamic)
            .map_err(|err| EvalError {
                message: err.to_string(),
            })
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(join) => Err(EvalError {
            message: format!("evaluation task failed: {join}"),
        }),
    }
}

fn build_engine(globals: SharedGlobals, sink: MessageSink) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_expr_depths(64, 64);
    engine.set_max_operations(MAX_OPERATIONS);
    engine.set_max_string_size(1_000_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(10_000);

    engine.register_type_with_name::<HtmlElement>("Element");
    engine.register_fn("html", |markup: String| HtmlElement(markup));

    // Console-style capture. `print` and `debug` are Rhai built-ins routed
    // through engine hooks; the rest are registered functions taking any
    // value and rendering it the same way outputs are rendered.
    let print_sink = sink.clone();
    engine.on_print(move |text| print_sink.push(Severity::Log, text));
    let debug_sink = sink.clone();
    engine.on_debug(move |text, _source, _pos| debug_sink.push(Severity::Debug, text));

    for (name, severity) in [
        ("log", Severity::Log),
        ("info", Severity::Log),
        ("warn", Severity::Log),
        ("error", Severity::Error),
    ] {
        let sink = sink.clone();
        engine.register_fn(name, move |message: Dynamic| {
            sink.push(severity, Value::from_dynamic(message).render());
        });
    }

    let read = globals.clone();
    engine.register_fn("get_global", move |name: String| -> Dynamic {
        read.lock()
            .unwrap()
            .get(&name)
            .map(Value::to_dynamic)
            .unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("set_global", move |name: String, value: Dynamic| {
        globals.lock().unwrap().insert(name, Value::from_dynamic(value));
    });

    engine
}
