// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! JSON codec for annotation trees.
//!
//! Parsing dispatches on the `@type` discriminator. The three modeled tags
//! (`koral:token`, `koral:termGroup`, `koral:term`) map onto their variants;
//! every other tag becomes a [`Foreign`] node that keeps the original object
//! and, where the payload allows it, re-parsed `wrap`/`operands` children.
//! Serialization emits the canonical shape for modeled variants and replays
//! the preserved payload for foreign ones, splicing in the current children
//! so rewrites inside unknown containers survive.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::node::{Foreign, MatchOp, Node, Relation, Term, TermGroup, Token};
use crate::rewrite::Rewrite;

const TYPE: &str = "@type";
const TOKEN_TAG: &str = "koral:token";
const GROUP_TAG: &str = "koral:termGroup";
const TERM_TAG: &str = "koral:term";

/// Parse or serialization failure of one tree node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tree node must be a JSON object")]
    NotAnObject,
    #[error("missing @type")]
    MissingType,
    #[error("koral:token requires a wrap node")]
    MissingWrap,
    #[error("koral:termGroup requires at least one operand")]
    EmptyGroup,
    #[error("koral:term requires a non-empty key")]
    EmptyKey,
}

impl Node {
    /// Parses a JSON document into an annotation tree.
    pub fn parse_json(input: &str) -> Result<Node, NodeError> {
        let value: Value = serde_json::from_str(input)?;
        Node::from_json_value(&value)
    }

    /// Parses an already deserialized JSON value into an annotation tree.
    pub fn from_json_value(value: &Value) -> Result<Node, NodeError> {
        let obj = value.as_object().ok_or(NodeError::NotAnObject)?;
        let tag = obj
            .get(TYPE)
            .and_then(Value::as_str)
            .ok_or(NodeError::MissingType)?;
        match tag {
            TOKEN_TAG => parse_token(obj),
            GROUP_TAG => parse_group(obj),
            TERM_TAG => parse_term(obj),
            _ => Ok(parse_foreign(tag, obj)),
        }
    }

    /// Serializes the tree back to a JSON value.
    pub fn to_json_value(&self) -> Value {
        match self {
            Node::Token(token) => {
                let mut obj = Map::new();
                obj.insert(TYPE.to_string(), Value::from(TOKEN_TAG));
                if let Some(wrap) = &token.wrap {
                    obj.insert("wrap".to_string(), wrap.to_json_value());
                }
                put_rewrites(&mut obj, &token.rewrites);
                Value::Object(obj)
            }
            Node::Group(group) => {
                let mut obj = Map::new();
                obj.insert(TYPE.to_string(), Value::from(GROUP_TAG));
                let operands: Vec<Value> =
                    group.operands.iter().map(Node::to_json_value).collect();
                obj.insert("operands".to_string(), Value::Array(operands));
                obj.insert(
                    "relation".to_string(),
                    Value::from(group.relation.as_koral()),
                );
                put_rewrites(&mut obj, &group.rewrites);
                Value::Object(obj)
            }
            Node::Term(term) => {
                let mut obj = Map::new();
                obj.insert(TYPE.to_string(), Value::from(TERM_TAG));
                if !term.foundry.is_empty() {
                    obj.insert("foundry".to_string(), Value::from(term.foundry.clone()));
                }
                if !term.layer.is_empty() {
                    obj.insert("layer".to_string(), Value::from(term.layer.clone()));
                }
                obj.insert("key".to_string(), Value::from(term.key.clone()));
                if !term.value.is_empty() {
                    obj.insert("value".to_string(), Value::from(term.value.clone()));
                }
                obj.insert("match".to_string(), Value::from(term.op.as_koral()));
                put_rewrites(&mut obj, &term.rewrites);
                Value::Object(obj)
            }
            Node::Foreign(foreign) => {
                let mut obj = foreign.payload.clone();
                if let Some(wrap) = &foreign.wrap {
                    obj.insert("wrap".to_string(), wrap.to_json_value());
                }
                if let Some(operands) = &foreign.operands {
                    let operands: Vec<Value> =
                        operands.iter().map(Node::to_json_value).collect();
                    obj.insert("operands".to_string(), Value::Array(operands));
                }
                Value::Object(obj)
            }
        }
    }
}

fn parse_token(obj: &Map<String, Value>) -> Result<Node, NodeError> {
    let wrap = match obj.get("wrap") {
        Some(Value::Null) | None => return Err(NodeError::MissingWrap),
        Some(wrap) => Box::new(Node::from_json_value(wrap)?),
    };
    Ok(Node::Token(Token {
        wrap: Some(wrap),
        rewrites: parse_rewrites(obj),
    }))
}

fn parse_group(obj: &Map<String, Value>) -> Result<Node, NodeError> {
    let operands = obj
        .get("operands")
        .and_then(Value::as_array)
        .ok_or(NodeError::EmptyGroup)?;
    if operands.is_empty() {
        return Err(NodeError::EmptyGroup);
    }
    let operands = operands
        .iter()
        .map(Node::from_json_value)
        .collect::<Result<Vec<_>, _>>()?;
    let relation = obj
        .get("relation")
        .and_then(Value::as_str)
        .map_or(Relation::And, Relation::from_koral);
    Ok(Node::Group(TermGroup {
        operands,
        relation,
        rewrites: parse_rewrites(obj),
    }))
}

fn parse_term(obj: &Map<String, Value>) -> Result<Node, NodeError> {
    let key = obj
        .get("key")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if key.is_empty() {
        return Err(NodeError::EmptyKey);
    }
    let field = |name: &str| {
        obj.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let op = obj
        .get("match")
        .and_then(Value::as_str)
        .map_or(MatchOp::Eq, MatchOp::from_koral);
    Ok(Node::Term(Term {
        foundry: field("foundry"),
        layer: field("layer"),
        key,
        value: field("value"),
        op,
        rewrites: parse_rewrites(obj),
    }))
}

/// An unknown tag keeps its whole object. Children behind the `wrap` and
/// `operands` edges are re-parsed only when they parse cleanly; otherwise the
/// verbatim payload alone represents them. Operand arrays re-parse all or
/// nothing, so serialization never mixes stale and rewritten elements.
fn parse_foreign(tag: &str, obj: &Map<String, Value>) -> Node {
    let wrap = obj
        .get("wrap")
        .and_then(|w| Node::from_json_value(w).ok())
        .map(Box::new);
    let operands = obj.get("operands").and_then(Value::as_array).and_then(|a| {
        a.iter()
            .map(|v| Node::from_json_value(v).ok())
            .collect::<Option<Vec<_>>>()
    });
    Node::Foreign(Foreign {
        tag: tag.to_string(),
        payload: obj.clone(),
        wrap,
        operands,
    })
}

fn parse_rewrites(obj: &Map<String, Value>) -> Vec<Rewrite> {
    obj.get("rewrites")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Rewrite::from_value).collect())
        .unwrap_or_default()
}

fn put_rewrites(obj: &mut Map<String, Value>, rewrites: &[Rewrite]) {
    if !rewrites.is_empty() {
        let entries: Vec<Value> = rewrites.iter().map(Rewrite::to_value).collect();
        obj.insert("rewrites".to_string(), Value::Array(entries));
    }
}
