// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Node variants of the annotation tree.
//!
//! The variant set is closed: everything a KoralQuery document can contain is
//! either one of the three modeled node types or a [`Foreign`] preservation
//! node. Equality between nodes is structural and deliberately blind to the
//! rewrite trail, so a rewritten tree still compares equal to its pre-trail
//! shape.

use serde_json::{Map, Value};

use crate::rewrite::Rewrite;

/// Match kind of a [`Term`] predicate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchOp {
    #[default]
    Eq,
    Ne,
}

impl MatchOp {
    /// The KoralQuery wire name, e.g. `match:eq`.
    pub fn as_koral(self) -> &'static str {
        match self {
            MatchOp::Eq => "match:eq",
            MatchOp::Ne => "match:ne",
        }
    }

    /// Maps a wire value onto the match kind. Only the `ne` suffix selects
    /// [`MatchOp::Ne`]; everything else is an equality match.
    pub fn from_koral(s: &str) -> Self {
        if s.ends_with("ne") { MatchOp::Ne } else { MatchOp::Eq }
    }
}

/// Relation of a [`TermGroup`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Relation {
    #[default]
    And,
    Or,
}

impl Relation {
    pub fn as_koral(self) -> &'static str {
        match self {
            Relation::And => "relation:and",
            Relation::Or => "relation:or",
        }
    }

    /// Maps a wire value onto the relation. Only the `or` suffix selects
    /// [`Relation::Or`].
    pub fn from_koral(s: &str) -> Self {
        if s.ends_with("or") { Relation::Or } else { Relation::And }
    }
}

/// A leaf predicate over a single annotation.
///
/// `foundry` and `layer` namespace the annotation; an empty `value` means the
/// predicate constrains the key only. The `key` is non-empty on every parsed
/// term.
#[derive(Clone, Debug, Default)]
pub struct Term {
    pub foundry: String,
    pub layer: String,
    pub key: String,
    pub value: String,
    pub op: MatchOp,
    pub rewrites: Vec<Rewrite>,
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.foundry == other.foundry
            && self.layer == other.layer
            && self.key == other.key
            && self.value == other.value
            && self.op == other.op
    }
}

/// An n-ary conjunction or disjunction of operand nodes.
///
/// Operand order is retained for serialization; `and`-matching treats the
/// list as a set.
#[derive(Clone, Debug, Default)]
pub struct TermGroup {
    pub operands: Vec<Node>,
    pub relation: Relation,
    pub rewrites: Vec<Rewrite>,
}

impl PartialEq for TermGroup {
    fn eq(&self, other: &Self) -> bool {
        self.relation == other.relation && self.operands == other.operands
    }
}

/// The positional annotation unit wrapping a single child node.
///
/// Parsed tokens always carry a wrap; the option only opens up while the
/// replacer simplifies intermediate shapes.
#[derive(Clone, Debug, Default)]
pub struct Token {
    pub wrap: Option<Box<Node>>,
    pub rewrites: Vec<Rewrite>,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.wrap == other.wrap
    }
}

/// Preservation node for a `@type` the mapper does not model.
///
/// The full original object is retained in `payload`; `wrap` and `operands`
/// additionally hold re-parsed children when the payload carries them in a
/// parseable shape, so rewrites still reach subtrees inside unknown
/// containers. Serialization re-emits the payload with the (possibly
/// rewritten) children spliced back in.
#[derive(Clone, Debug)]
pub struct Foreign {
    pub tag: String,
    pub payload: Map<String, Value>,
    pub wrap: Option<Box<Node>>,
    pub operands: Option<Vec<Node>>,
}

impl PartialEq for Foreign {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.payload == other.payload
            && self.wrap == other.wrap
            && self.operands == other.operands
    }
}

/// A node of the annotation tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Token(Token),
    Group(TermGroup),
    Term(Term),
    Foreign(Foreign),
}

impl Node {
    /// Recursively applies non-empty foundry/layer overrides to every term
    /// reachable through token, group, and foreign edges. Empty overrides
    /// leave the respective field untouched.
    pub fn apply_overrides(&mut self, foundry: &str, layer: &str) {
        if foundry.is_empty() && layer.is_empty() {
            return;
        }
        match self {
            Node::Term(t) => {
                if !foundry.is_empty() {
                    t.foundry = foundry.to_string();
                }
                if !layer.is_empty() {
                    t.layer = layer.to_string();
                }
            }
            Node::Group(g) => {
                for op in &mut g.operands {
                    op.apply_overrides(foundry, layer);
                }
            }
            Node::Token(t) => {
                if let Some(wrap) = &mut t.wrap {
                    wrap.apply_overrides(foundry, layer);
                }
            }
            Node::Foreign(f) => {
                if let Some(wrap) = &mut f.wrap {
                    wrap.apply_overrides(foundry, layer);
                }
                if let Some(operands) = &mut f.operands {
                    for op in operands {
                        op.apply_overrides(foundry, layer);
                    }
                }
            }
        }
    }

    /// Collects all terms of the tree in pre-order.
    pub fn terms(&self) -> Vec<&Term> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a Term>) {
        match self {
            Node::Term(t) => out.push(t),
            Node::Group(g) => {
                for op in &g.operands {
                    op.collect_terms(out);
                }
            }
            Node::Token(t) => {
                if let Some(wrap) = &t.wrap {
                    wrap.collect_terms(out);
                }
            }
            Node::Foreign(f) => {
                if let Some(wrap) = &f.wrap {
                    wrap.collect_terms(out);
                }
                for op in f.operands.iter().flatten() {
                    op.collect_terms(out);
                }
            }
        }
    }

    /// Attaches a rewrite trail entry. Foreign nodes stay untouched; their
    /// payload is not ours to extend.
    pub fn push_rewrite(&mut self, rewrite: Rewrite) {
        match self {
            Node::Term(t) => t.rewrites.push(rewrite),
            Node::Group(g) => g.rewrites.push(rewrite),
            Node::Token(t) => t.rewrites.push(rewrite),
            Node::Foreign(_) => {}
        }
    }
}
