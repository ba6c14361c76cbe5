//! Result values produced by cell evaluation.
//!
//! Rhai hands back a `Dynamic`; the cell model wants something it can
//! classify and render without dragging engine types through the rest of
//! the library. `Value` is that boundary: every evaluation result is
//! normalized into one of its variants, and `render` produces the textual
//! representation stored as the cell's output.

use rhai::Dynamic;

/// A rich HTML result, constructed in scripts via `html("<b>…</b>")`.
/// Rendered verbatim rather than escaped as text.
#[derive(Debug, Clone)]
pub struct HtmlElement(pub String);

/// Normalized evaluation result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Raw HTML markup, attached to the output as-is.
    Element(String),
    /// Arrays and maps, carried as JSON.
    Structured(serde_json::Value),
}

impl Value {
    /// Normalize a Rhai result. Unit maps to `Null`; arrays and maps are
    /// converted to JSON; anything unrecognized falls back to its display
    /// formatting as text.
    pub fn from_dynamic(value: Dynamic) -> Value {
        if value.is_unit() {
            Value::Null
        } else if let Ok(flag) = value.as_bool() {
            Value::Bool(flag)
        } else if let Ok(int) = value.as_int() {
            Value::Int(int)
        } else if let Ok(float) = value.as_float() {
            Value::Float(float)
        } else if value.is_string() {
            Value::Text(value.into_string().unwrap_or_default())
        } else if let Some(element) = value.clone().try_cast::<HtmlElement>() {
            Value::Element(element.0)
        } else if value.is_array() || value.is_map() {
            Value::Structured(dynamic_to_json(&value))
        } else {
            Value::Text(value.to_string())
        }
    }

    /// Bridge back into the engine, used when injecting context bindings
    /// into an evaluation scope.
    pub fn to_dynamic(&self) -> Dynamic {
        match self {
            Value::Null => Dynamic::UNIT,
            Value::Bool(flag) => (*flag).into(),
            Value::Int(int) => (*int).into(),
            Value::Float(float) => (*float).into(),
            Value::Text(text) => text.clone().into(),
            Value::Element(markup) => Dynamic::from(HtmlElement(markup.clone())),
            Value::Structured(json) => json_to_dynamic(json),
        }
    }

    /// Rendered representation stored as cell output: null literally,
    /// scalars as plain text, elements as their raw markup, structured
    /// values as pretty-printed JSON.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Int(int) => int.to_string(),
            Value::Float(float) => float.to_string(),
            Value::Text(text) => text.clone(),
            Value::Element(markup) => markup.clone(),
            Value::Structured(json) => {
                serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string())
            }
        }
    }
}

fn dynamic_to_json(value: &Dynamic) -> serde_json::Value {
    if value.is_unit() {
        serde_json::Value::Null
    } else if let Ok(flag) = value.as_bool() {
        flag.into()
    } else if let Ok(int) = value.as_int() {
        int.into()
    } else if let Ok(float) = value.as_float() {
        serde_json::json!(float)
    } else if value.is_string() {
        value.clone().into_string().unwrap_or_default().into()
    } else if value.is_array() {
        let items = value.clone().try_cast::<rhai::Array>().unwrap_or_default();
        serde_json::Value::Array(items.iter().map(dynamic_to_json).collect())
    } else if value.is_map() {
        let map = value.clone().try_cast::<rhai::Map>().unwrap_or_default();
        serde_json::Value::Object(
            map.iter()
                .map(|(key, entry)| (key.to_string(), dynamic_to_json(entry)))
                .collect(),
        )
    } else {
        serde_json::Value::String(value.to_string())
    }
}

fn json_to_dynamic(value: &serde_json::Value) -> Dynamic {
    match value {
        serde_json::Value::Null => Dynamic::UNIT,
        serde_json::Value::Bool(flag) => (*flag).into(),
        serde_json::Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                int.into()
            } else {
                number.as_f64().unwrap_or(0.0).into()
            }
        }
        serde_json::Value::String(text) => text.clone().into(),
        serde_json::Value::Array(items) => {
            Dynamic::from_array(items.iter().map(json_to_dynamic).collect())
        }
        serde_json::Value::Object(entries) => {
            let mut map = rhai::Map::new();
            for (key, entry) in entries {
                map.insert(key.as_str().into(), json_to_dynamic(entry));
            }
            Dynamic::from_map(map)
        }
    }
}
