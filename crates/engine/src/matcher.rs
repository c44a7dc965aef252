// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Structural Matching and Replacement
//!
//! A [`TreeMatcher`] holds one oriented rule: the pattern it looks for and
//! the replacement it injects. Matching is structural and order-insensitive
//! for conjunctions: a pattern group matches a subject group when an
//! injective assignment from pattern operands to subject operands exists,
//! with [`BitSet`] bookkeeping over the subject side during backtracking.
//! Disjunctive patterns distribute over their alternatives, and any pattern
//! matches wherever it appears as a constituent of a token, group, or
//! foreign container.
//!
//! Replacement is pure: the input tree is never mutated, every injection is
//! a deep clone of the replacement root, and the result shares no storage
//! with either. When a trail source is given, each injected subtree carries
//! a [`Rewrite`] entry with the serialized pre-rewrite form.

use std::collections::BTreeSet;

use bit_set::BitSet;
use koral_ast::{Foreign, Node, Relation, Rewrite, TermGroup, Token};
use thiserror::Error;

/// Editor name recorded on every trail entry this engine emits.
const EDITOR: &str = "Koral-Mapper";
const OPERATION: &str = "operation:override";

/// Construction failure of a [`TreeMatcher`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatcherError {
    #[error("pattern and replacement must consist of token, term, and term group nodes")]
    ForeignNode,
    #[error("empty term group in pattern or replacement")]
    EmptyGroup,
    #[error("token without wrap in pattern or replacement")]
    EmptyToken,
}

/// One oriented rule, validated once and reusable across subjects.
#[derive(Clone, Debug)]
pub struct TreeMatcher {
    pattern: Node,
    replacement: Node,
}

impl TreeMatcher {
    /// Validates both trees and strips the token shell off either root:
    /// rule sides arrive token-wrapped, but matching and injection operate
    /// on the wrapped predicate.
    pub fn new(pattern: Node, replacement: Node) -> Result<Self, MatcherError> {
        validate(&pattern)?;
        validate(&replacement)?;
        Ok(TreeMatcher {
            pattern: unwrap_root(pattern),
            replacement: unwrap_root(replacement),
        })
    }

    pub fn pattern(&self) -> &Node {
        &self.pattern
    }

    pub fn replacement(&self) -> &Node {
        &self.replacement
    }

    /// Whether the pattern matches the subject or any of its constituents.
    pub fn is_match(&self, subject: &Node) -> bool {
        node_matches(subject, &self.pattern)
    }

    /// Rewrites every match in `tree`, returning a new tree. A tree without
    /// matches comes back structurally unchanged. `trail` carries the source
    /// recorded on emitted rewrite entries; `None` disables the trail.
    pub fn replace(&self, tree: &Node, trail: Option<&str>) -> Node {
        let mut changed = false;
        let substituted = self.substitute(tree, trail, &mut changed);
        if !changed {
            return substituted;
        }
        match simplify(substituted) {
            Some(node) => {
                if matches!(tree, Node::Token(_)) && !matches!(node, Node::Token(_)) {
                    Node::Token(Token {
                        wrap: Some(Box::new(node)),
                        rewrites: Vec::new(),
                    })
                } else {
                    node
                }
            }
            None => {
                if matches!(tree, Node::Token(_)) {
                    Node::Token(Token::default())
                } else {
                    tree.clone()
                }
            }
        }
    }

    fn substitute(&self, node: &Node, trail: Option<&str>, changed: &mut bool) -> Node {
        match node {
            Node::Token(token) => Node::Token(Token {
                wrap: token
                    .wrap
                    .as_ref()
                    .map(|wrap| Box::new(self.substitute(wrap, trail, changed))),
                rewrites: token.rewrites.clone(),
            }),
            Node::Foreign(foreign) => Node::Foreign(Foreign {
                tag: foreign.tag.clone(),
                payload: foreign.payload.clone(),
                wrap: foreign
                    .wrap
                    .as_ref()
                    .map(|wrap| Box::new(self.substitute(wrap, trail, changed))),
                operands: foreign.operands.as_ref().map(|operands| {
                    operands
                        .iter()
                        .map(|operand| self.substitute(operand, trail, changed))
                        .collect()
                }),
            }),
            Node::Group(group) => {
                // an operand match wins over a whole-group match so the
                // siblings of the matching operand survive
                if let Some(first) = group
                    .operands
                    .iter()
                    .position(|operand| node_matches(operand, &self.pattern))
                {
                    let operands = group
                        .operands
                        .iter()
                        .enumerate()
                        .map(|(index, operand)| {
                            if index == first {
                                self.injected(operand, trail, changed)
                            } else {
                                self.substitute(operand, trail, changed)
                            }
                        })
                        .collect();
                    return Node::Group(TermGroup {
                        operands,
                        relation: group.relation,
                        rewrites: group.rewrites.clone(),
                    });
                }
                if node_matches(node, &self.pattern) {
                    return self.injected(node, trail, changed);
                }
                Node::Group(TermGroup {
                    operands: group
                        .operands
                        .iter()
                        .map(|operand| self.substitute(operand, trail, changed))
                        .collect(),
                    relation: group.relation,
                    rewrites: group.rewrites.clone(),
                })
            }
            Node::Term(_) => {
                if node_matches(node, &self.pattern) {
                    self.injected(node, trail, changed)
                } else {
                    node.clone()
                }
            }
        }
    }

    /// A deep clone of the replacement root standing in for `original`.
    fn injected(&self, original: &Node, trail: Option<&str>, changed: &mut bool) -> Node {
        *changed = true;
        let mut clone = self.replacement.clone();
        if let Some(src) = trail {
            clone.push_rewrite(Rewrite {
                editor: Some(EDITOR.to_string()),
                operation: Some(OPERATION.to_string()),
                scope: rewrite_scope(original, &clone),
                src: Some(src.to_string()),
                comment: None,
                original: Some(original.to_json_value()),
            });
        }
        clone
    }
}

/// Structural match of `pattern` against `subject`.
pub(crate) fn node_matches(subject: &Node, pattern: &Node) -> bool {
    // a disjunctive pattern matches when any alternative does
    if let Node::Group(group) = pattern {
        if group.relation == Relation::Or {
            return group
                .operands
                .iter()
                .any(|alternative| node_matches(subject, alternative));
        }
    }
    match (subject, pattern) {
        (Node::Token(subject), Node::Token(pattern)) => match (&subject.wrap, &pattern.wrap) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(subject), Some(pattern)) => node_matches(subject, pattern),
        },
        // a pattern matches wherever it appears as a constituent
        (Node::Token(subject), _) => subject
            .wrap
            .as_deref()
            .is_some_and(|wrap| node_matches(wrap, pattern)),
        (Node::Foreign(subject), _) => {
            subject
                .wrap
                .as_deref()
                .is_some_and(|wrap| node_matches(wrap, pattern))
                || subject
                    .operands
                    .iter()
                    .flatten()
                    .any(|operand| node_matches(operand, pattern))
        }
        (Node::Term(subject), Node::Term(pattern)) => {
            subject.foundry == pattern.foundry
                && subject.layer == pattern.layer
                && subject.key == pattern.key
                && subject.op == pattern.op
                && (pattern.value.is_empty() || subject.value == pattern.value)
        }
        (Node::Group(subject_group), Node::Group(pattern_group))
            if subject_group.relation == pattern_group.relation =>
        {
            conjunction_matches(subject_group, pattern_group)
                || subject_group
                    .operands
                    .iter()
                    .any(|operand| node_matches(operand, pattern))
        }
        (Node::Group(subject), _) => subject
            .operands
            .iter()
            .any(|operand| node_matches(operand, pattern)),
        _ => false,
    }
}

/// Order-insensitive conjunction match: every pattern operand claims a
/// distinct subject operand, extra subject operands are allowed. First-fit
/// with backtracking; well-formed rules have unique operands, so the
/// backtracking branch is rarely taken.
fn conjunction_matches(subject: &TermGroup, pattern: &TermGroup) -> bool {
    if pattern.operands.len() > subject.operands.len() {
        return false;
    }
    let mut used = BitSet::with_capacity(subject.operands.len());
    assign(&pattern.operands, 0, &subject.operands, &mut used)
}

fn assign(pattern: &[Node], index: usize, subject: &[Node], used: &mut BitSet) -> bool {
    let Some(next) = pattern.get(index) else {
        return true;
    };
    for (slot, candidate) in subject.iter().enumerate() {
        if used.contains(slot) || !node_matches(candidate, next) {
            continue;
        }
        used.insert(slot);
        if assign(pattern, index + 1, subject, used) {
            return true;
        }
        used.remove(slot);
    }
    false
}

/// Bottom-up cleanup after substitution: nil children are dropped, a group
/// with one remaining operand collapses into it, a token whose wrap
/// simplified away is dropped.
fn simplify(node: Node) -> Option<Node> {
    match node {
        Node::Token(token) => {
            let wrap = token.wrap.and_then(|wrap| simplify(*wrap))?;
            Some(Node::Token(Token {
                wrap: Some(Box::new(wrap)),
                rewrites: token.rewrites,
            }))
        }
        Node::Group(group) => {
            let mut operands: Vec<Node> = group
                .operands
                .into_iter()
                .filter_map(simplify)
                .collect();
            match operands.len() {
                0 => None,
                1 => Some(operands.remove(0)),
                _ => Some(Node::Group(TermGroup {
                    operands,
                    relation: group.relation,
                    rewrites: group.rewrites,
                })),
            }
        }
        other => Some(other),
    }
}

/// Which dimension a rewrite changed, judged over the term sets before and
/// after the injection.
fn rewrite_scope(original: &Node, replacement: &Node) -> Option<String> {
    let foundries = |node: &Node| -> BTreeSet<String> {
        node.terms().iter().map(|t| t.foundry.clone()).collect()
    };
    if foundries(original) != foundries(replacement) {
        return Some("foundry".to_string());
    }
    let layers = |node: &Node| -> BTreeSet<String> {
        node.terms().iter().map(|t| t.layer.clone()).collect()
    };
    if layers(original) != layers(replacement) {
        return Some("layer".to_string());
    }
    None
}

fn validate(node: &Node) -> Result<(), MatcherError> {
    match node {
        Node::Term(_) => Ok(()),
        Node::Group(group) => {
            if group.operands.is_empty() {
                return Err(MatcherError::EmptyGroup);
            }
            group.operands.iter().try_for_each(validate)
        }
        Node::Token(token) => match &token.wrap {
            Some(wrap) => validate(wrap),
            None => Err(MatcherError::EmptyToken),
        },
        Node::Foreign(_) => Err(MatcherError::ForeignNode),
    }
}

fn unwrap_root(node: Node) -> Node {
    match node {
        Node::Token(Token {
            wrap: Some(wrap), ..
        }) => *wrap,
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use koral_ast::Term;

    fn term(foundry: &str, layer: &str, key: &str, value: &str) -> Node {
        Node::Term(Term {
            foundry: foundry.to_string(),
            layer: layer.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            ..Default::default()
        })
    }

    fn group(relation: Relation, operands: Vec<Node>) -> Node {
        Node::Group(TermGroup {
            operands,
            relation,
            rewrites: Vec::new(),
        })
    }

    fn token(wrap: Node) -> Node {
        Node::Token(Token {
            wrap: Some(Box::new(wrap)),
            rewrites: Vec::new(),
        })
    }

    fn matcher(pattern: Node, replacement: Node) -> TreeMatcher {
        TreeMatcher::new(pattern, replacement).expect("valid matcher")
    }

    #[test]
    fn test_term_match_with_value_wildcard() {
        let m = matcher(
            term("opennlp", "p", "PIDAT", ""),
            term("opennlp", "p", "DET", ""),
        );
        assert!(m.is_match(&term("opennlp", "p", "PIDAT", "")));
        assert!(m.is_match(&term("opennlp", "p", "PIDAT", "anything")));
        assert!(!m.is_match(&term("opennlp", "p", "DET", "")));
        assert!(!m.is_match(&term("opennlp", "x", "PIDAT", "")));
    }

    #[test]
    fn test_term_match_with_required_value() {
        let m = matcher(
            term("opennlp", "p", "AdjType", "Pdt"),
            term("opennlp", "p", "DET", ""),
        );
        assert!(m.is_match(&term("opennlp", "p", "AdjType", "Pdt")));
        assert!(!m.is_match(&term("opennlp", "p", "AdjType", "")));
        assert!(!m.is_match(&term("opennlp", "p", "AdjType", "Art")));
    }

    #[test]
    fn test_conjunction_is_commutative() {
        let pattern = group(
            Relation::And,
            vec![
                term("ud", "p", "DET", ""),
                term("ud", "p", "AdjType", "Pdt"),
            ],
        );
        let m = matcher(pattern, term("opennlp", "p", "PIDAT", ""));
        let forward = group(
            Relation::And,
            vec![
                term("ud", "p", "DET", ""),
                term("ud", "p", "AdjType", "Pdt"),
            ],
        );
        let reversed = group(
            Relation::And,
            vec![
                term("ud", "p", "AdjType", "Pdt"),
                term("ud", "p", "DET", ""),
            ],
        );
        assert!(m.is_match(&forward));
        assert!(m.is_match(&reversed));
    }

    #[test]
    fn test_conjunction_allows_extra_subject_operands() {
        let pattern = group(Relation::And, vec![term("ud", "p", "DET", "")]);
        let m = matcher(pattern, term("opennlp", "p", "PIDAT", ""));
        let subject = group(
            Relation::And,
            vec![
                term("ud", "p", "Case", "Nom"),
                term("ud", "p", "DET", ""),
            ],
        );
        assert!(m.is_match(&subject));
    }

    #[test]
    fn test_conjunction_requires_distinct_operands() {
        let pattern = group(
            Relation::And,
            vec![term("ud", "p", "DET", ""), term("ud", "p", "DET", "")],
        );
        let m = matcher(pattern, term("opennlp", "p", "PIDAT", ""));
        let subject = group(Relation::And, vec![term("ud", "p", "DET", "")]);
        assert!(!m.is_match(&subject));
        let doubled = group(
            Relation::And,
            vec![term("ud", "p", "DET", ""), term("ud", "p", "DET", "")],
        );
        assert!(m.is_match(&doubled));
    }

    #[test]
    fn test_disjunctive_pattern_distributes() {
        let pattern = group(
            Relation::Or,
            vec![
                term("ud", "p", "PronType", "Ind"),
                term("ud", "p", "PronType", "Neg"),
            ],
        );
        let m = matcher(pattern, term("opennlp", "p", "PIDAT", ""));
        assert!(m.is_match(&term("ud", "p", "PronType", "Neg")));
        assert!(!m.is_match(&term("ud", "p", "PronType", "Tot")));
    }

    #[test]
    fn test_pattern_matches_as_constituent() {
        let pattern = term("ud", "p", "DET", "");
        let m = matcher(pattern, term("opennlp", "p", "PIDAT", ""));
        let subject = token(group(
            Relation::And,
            vec![
                term("ud", "p", "DET", ""),
                term("ud", "p", "Case", "Nom"),
            ],
        ));
        assert!(m.is_match(&subject));
    }

    #[test]
    fn test_replace_whole_wrap() {
        let m = matcher(
            token(term("opennlp", "p", "PIDAT", "")),
            token(group(
                Relation::And,
                vec![
                    term("opennlp", "p", "PIDAT", ""),
                    term("opennlp", "p", "AdjType", "Pdt"),
                ],
            )),
        );
        let subject = token(term("opennlp", "p", "PIDAT", ""));
        let replaced = m.replace(&subject, None);
        let expected = token(group(
            Relation::And,
            vec![
                term("opennlp", "p", "PIDAT", ""),
                term("opennlp", "p", "AdjType", "Pdt"),
            ],
        ));
        assert_eq!(replaced, expected);
    }

    #[test]
    fn test_replace_collapses_group_to_term() {
        let m = matcher(
            token(group(
                Relation::And,
                vec![
                    term("opennlp", "p", "PIDAT", ""),
                    term("opennlp", "p", "AdjType", "Pdt"),
                ],
            )),
            token(term("opennlp", "p", "PIDAT", "")),
        );
        let subject = token(group(
            Relation::And,
            vec![
                term("opennlp", "p", "AdjType", "Pdt"),
                term("opennlp", "p", "PIDAT", ""),
            ],
        ));
        let replaced = m.replace(&subject, None);
        assert_eq!(replaced, token(term("opennlp", "p", "PIDAT", "")));
    }

    #[test]
    fn test_replace_inside_group_keeps_siblings() {
        let m = matcher(
            term("opennlp", "p", "PIDAT", ""),
            term("ud", "p", "DET", ""),
        );
        let subject = group(
            Relation::And,
            vec![
                term("opennlp", "p", "PIDAT", ""),
                term("opennlp", "p", "Case", "Nom"),
            ],
        );
        let replaced = m.replace(&subject, None);
        let expected = group(
            Relation::And,
            vec![
                term("ud", "p", "DET", ""),
                term("opennlp", "p", "Case", "Nom"),
            ],
        );
        assert_eq!(replaced, expected);
    }

    #[test]
    fn test_no_match_returns_equal_tree() {
        let m = matcher(
            term("opennlp", "p", "PIDAT", ""),
            term("ud", "p", "DET", ""),
        );
        let subject = token(group(
            Relation::And,
            vec![
                term("opennlp", "p", "ART", ""),
                term("opennlp", "p", "Case", "Nom"),
            ],
        ));
        assert_eq!(m.replace(&subject, None), subject);
    }

    #[test]
    fn test_replace_result_does_not_alias_the_rule() {
        let m = matcher(
            term("opennlp", "p", "PIDAT", ""),
            term("ud", "p", "DET", ""),
        );
        let subject = token(term("opennlp", "p", "PIDAT", ""));
        let mut replaced = m.replace(&subject, None);
        replaced.apply_overrides("mutated", "mutated");
        // the rule is unaffected by mutations of the result
        assert_eq!(m.replacement(), &term("ud", "p", "DET", ""));
        let again = m.replace(&subject, None);
        assert_eq!(again, token(term("ud", "p", "DET", "")));
    }

    #[test]
    fn test_trail_records_original_and_scope() {
        let m = matcher(
            term("opennlp", "p", "PIDAT", ""),
            term("ud", "p", "DET", ""),
        );
        let subject = token(term("opennlp", "p", "PIDAT", ""));
        let replaced = m.replace(&subject, Some("stts-ud"));
        let Node::Token(token) = &replaced else {
            panic!("token shell must survive")
        };
        let Node::Term(term) = token.wrap.as_deref().expect("wrap") else {
            panic!("wrap must be the injected term")
        };
        let rewrite = &term.rewrites[0];
        assert_eq!(rewrite.editor.as_deref(), Some("Koral-Mapper"));
        assert_eq!(rewrite.operation.as_deref(), Some("operation:override"));
        assert_eq!(rewrite.scope.as_deref(), Some("foundry"));
        assert_eq!(rewrite.src.as_deref(), Some("stts-ud"));
        let original = rewrite.original.as_ref().expect("original payload");
        assert_eq!(
            original.get("key").and_then(|v| v.as_str()),
            Some("PIDAT")
        );
    }

    #[test]
    fn test_foreign_nodes_are_rejected_in_rules() {
        let foreign = Node::Foreign(koral_ast::Foreign {
            tag: "koral:span".to_string(),
            payload: serde_json::Map::new(),
            wrap: None,
            operands: None,
        });
        let err = TreeMatcher::new(foreign, term("a", "b", "c", "")).expect_err("must fail");
        assert_eq!(err, MatcherError::ForeignNode);
    }

    #[test]
    fn test_empty_group_is_rejected() {
        let empty = group(Relation::And, Vec::new());
        let err = TreeMatcher::new(empty, term("a", "b", "c", "")).expect_err("must fail");
        assert_eq!(err, MatcherError::EmptyGroup);
    }

    #[test]
    fn test_rewrite_inside_foreign_wrap() {
        let m = matcher(
            term("opennlp", "p", "PIDAT", ""),
            term("ud", "p", "DET", ""),
        );
        let inner = token(term("opennlp", "p", "PIDAT", ""));
        let subject = Node::Foreign(koral_ast::Foreign {
            tag: "koral:unknown".to_string(),
            payload: serde_json::Map::new(),
            wrap: Some(Box::new(inner)),
            operands: None,
        });
        let replaced = m.replace(&subject, None);
        let Node::Foreign(foreign) = &replaced else {
            panic!("foreign shell must survive")
        };
        assert_eq!(
            foreign.wrap.as_deref(),
            Some(&token(term("ud", "p", "DET", "")))
        );
    }
}
