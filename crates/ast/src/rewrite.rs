// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rewrite trail entries.
//!
//! A trail entry is sidecar metadata on a node the mapper replaced: who
//! rewrote it, what kind of change it was, and the pre-rewrite payload.
//! Comparisons between nodes ignore the trail entirely.

use serde_json::{Map, Value};

/// One entry of the rewrite trail.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rewrite {
    pub editor: Option<String>,
    pub operation: Option<String>,
    pub scope: Option<String>,
    pub src: Option<String>,
    pub comment: Option<String>,
    /// Serialized pre-rewrite form of the node this entry is attached to.
    pub original: Option<Value>,
}

impl Rewrite {
    /// Ingests a serialized trail entry, normalizing legacy field aliases:
    /// `source` feeds `editor`, `origin` feeds `src`, and `original` wins
    /// over either alias where both appear.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |name: &str| obj.get(name).and_then(Value::as_str).map(str::to_string);
        Some(Rewrite {
            editor: field("editor").or_else(|| field("source")),
            operation: field("operation"),
            scope: field("scope"),
            src: field("src").or_else(|| field("origin")),
            comment: field("_comment").or_else(|| field("comment")),
            original: obj.get("original").cloned(),
        })
    }

    /// Serializes the entry to its wire shape.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("@type".to_string(), Value::from("koral:rewrite"));
        if let Some(editor) = &self.editor {
            obj.insert("editor".to_string(), Value::from(editor.clone()));
        }
        if let Some(operation) = &self.operation {
            obj.insert("operation".to_string(), Value::from(operation.clone()));
        }
        if let Some(scope) = &self.scope {
            obj.insert("scope".to_string(), Value::from(scope.clone()));
        }
        if let Some(src) = &self.src {
            obj.insert("src".to_string(), Value::from(src.clone()));
        }
        if let Some(original) = &self.original {
            obj.insert("original".to_string(), original.clone());
        }
        if let Some(comment) = &self.comment {
            obj.insert("_comment".to_string(), Value::from(comment.clone()));
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_aliases_normalize() {
        let value = json!({
            "@type": "koral:rewrite",
            "source": "Kustvakt",
            "origin": "query",
        });
        let rewrite = Rewrite::from_value(&value).expect("parses");
        assert_eq!(rewrite.editor.as_deref(), Some("Kustvakt"));
        assert_eq!(rewrite.src.as_deref(), Some("query"));
        assert!(rewrite.original.is_none());
    }

    #[test]
    fn test_modern_fields_win_over_aliases() {
        let value = json!({
            "editor": "Koral-Mapper",
            "source": "Kustvakt",
            "src": "token",
            "origin": "query",
            "original": {"@type": "koral:term", "key": "PIDAT", "match": "match:eq"},
        });
        let rewrite = Rewrite::from_value(&value).expect("parses");
        assert_eq!(rewrite.editor.as_deref(), Some("Koral-Mapper"));
        assert_eq!(rewrite.src.as_deref(), Some("token"));
        assert!(rewrite.original.is_some());
    }

    #[test]
    fn test_round_trip() {
        let rewrite = Rewrite {
            editor: Some("Koral-Mapper".to_string()),
            operation: Some("operation:override".to_string()),
            scope: Some("foundry".to_string()),
            original: Some(json!({"@type": "koral:term", "key": "DET", "match": "match:eq"})),
            ..Default::default()
        };
        let back = Rewrite::from_value(&rewrite.to_value()).expect("parses");
        assert_eq!(back, rewrite);
    }

    #[test]
    fn test_non_object_is_skipped() {
        assert!(Rewrite::from_value(&json!("koral:rewrite")).is_none());
    }
}
