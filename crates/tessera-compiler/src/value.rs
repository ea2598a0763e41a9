//! Values bound to tokens during expansion.

use indexmap::IndexMap;
use serde_json::{json, Map, Value as Json};

use crate::traits::CompileError;

/// Marker key of a markup fragment produced by `html(…)` in a behavior script.
pub const MARKUP_MARKER: &str = "__tessera_html";

/// Marker key of a deferred instantiation produced by `createComponent(…)`.
pub const COMPONENT_MARKER: &str = "__tessera_component";

/// A value a token can be replaced with.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Literal text, escaped on insertion
    Text(String),

    /// Markup parsed into nodes on insertion
    Markup(String),

    /// A component instantiated on insertion
    Component { id: String, values: Values },

    /// A sequence of the above, inserted in order
    List(Vec<Value>),
}

/// Ordered values bag. Later inserts win.
pub type Values = IndexMap<String, Value>;

impl Value {
    /// Convert a script-provided JSON value. `null` yields `None`.
    pub fn from_json(key: &str, json: &Json) -> Result<Option<Value>, CompileError> {
        let value = match json {
            Json::Null => return Ok(None),
            Json::String(s) => Value::Text(s.clone()),
            Json::Bool(b) => Value::Text(b.to_string()),
            Json::Number(n) => Value::Text(n.to_string()),
            Json::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(value) = Value::from_json(key, item)? {
                        list.push(value);
                    }
                }
                Value::List(list)
            }
            Json::Object(map) => {
                if let Some(markup) = map.get(MARKUP_MARKER).and_then(Json::as_str) {
                    Value::Markup(markup.to_string())
                } else if let Some(id) = map.get(COMPONENT_MARKER).and_then(Json::as_str) {
                    let values = match map.get("values") {
                        Some(Json::Object(inner)) => values_from_json(inner)?,
                        _ => Values::new(),
                    };
                    Value::Component {
                        id: id.to_string(),
                        values,
                    }
                } else {
                    return Err(CompileError::InvalidValue {
                        key: key.to_string(),
                        found: "object".to_string(),
                    });
                }
            }
        };
        Ok(Some(value))
    }

    /// JSON handed to behavior scripts.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Text(s) => Json::String(s.clone()),
            Value::Markup(markup) => json!({ MARKUP_MARKER: markup }),
            Value::Component { id, values } => json!({
                COMPONENT_MARKER: id,
                "values": values_to_json(values),
            }),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// Plain text rendition used inside attribute values and client payloads.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Text(s) | Value::Markup(s) => s.clone(),
            Value::Component { id, .. } => format!("<{id}></{id}>"),
            Value::List(items) => items.iter().map(Value::to_plain_string).collect(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Convert a JSON object into values, failing on unsupported entries.
pub fn values_from_json(map: &Map<String, Json>) -> Result<Values, CompileError> {
    let mut values = Values::new();
    for (key, json) in map {
        if let Some(value) = Value::from_json(key, json)? {
            values.insert(key.clone(), value);
        }
    }
    Ok(values)
}

pub fn values_to_json(values: &Values) -> Json {
    Json::Object(
        values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// Convert a frontmatter entry (as JSON) into a document value. Mappings have no
/// token rendition and are skipped.
pub fn document_value(json: &Json) -> Option<Value> {
    match json {
        Json::Null | Json::Object(_) => None,
        Json::String(s) => Some(Value::Text(s.clone())),
        Json::Bool(b) => Some(Value::Text(b.to_string())),
        Json::Number(n) => Some(Value::Text(n.to_string())),
        Json::Array(items) => Some(Value::List(items.iter().filter_map(document_value).collect())),
    }
}

/// `data-user-name` → `dataUserName`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn converts_scalars_to_text() {
        assert_eq!(
            Value::from_json("a", &json!("x")).unwrap(),
            Some(Value::Text("x".into()))
        );
        assert_eq!(
            Value::from_json("a", &json!(3)).unwrap(),
            Some(Value::Text("3".into()))
        );
        assert_eq!(
            Value::from_json("a", &json!(true)).unwrap(),
            Some(Value::Text("true".into()))
        );
        assert_eq!(Value::from_json("a", &Json::Null).unwrap(), None);
    }

    #[test]
    fn recognizes_markers() {
        let markup = Value::from_json("a", &json!({ "__tessera_html": "<b>x</b>" })).unwrap();
        assert_eq!(markup, Some(Value::Markup("<b>x</b>".into())));

        let component = Value::from_json(
            "a",
            &json!({ "__tessera_component": "x-badge", "values": { "label": "new" } }),
        )
        .unwrap()
        .unwrap();
        match component {
            Value::Component { id, values } => {
                assert_eq!(id, "x-badge");
                assert_eq!(values["label"], Value::Text("new".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_plain_objects() {
        let err = Value::from_json("items", &json!({ "a": 1 })).unwrap_err();
        assert!(matches!(err, CompileError::InvalidValue { ref key, .. } if key == "items"));

        let nested = Value::from_json("items", &json!(["ok", { "a": 1 }]));
        assert!(nested.is_err());
    }

    #[test]
    fn json_roundtrip_preserves_order() {
        let mut values = Values::new();
        values.insert("z".into(), Value::Text("1".into()));
        values.insert("a".into(), Value::Markup("<i>2</i>".into()));

        let json = values_to_json(&values);
        let back = values_from_json(json.as_object().unwrap()).unwrap();

        assert_eq!(back, values);
        assert_eq!(back.keys().collect::<Vec<_>>(), vec!["z", "a"]);
    }

    #[test]
    fn camel_cases_hyphenated_names() {
        assert_eq!(camel_case("data-user-name"), "dataUserName");
        assert_eq!(camel_case("title"), "title");
    }

    #[test]
    fn converts_frontmatter_values() {
        assert_eq!(document_value(&json!("Home")), Some(Value::Text("Home".into())));
        assert_eq!(document_value(&json!({ "a": 1 })), None);
        assert_eq!(
            document_value(&json!(["a", 2])),
            Some(Value::List(vec![Value::Text("a".into()), Value::Text("2".into())]))
        );
    }
}
