// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The mapping rule grammar.
//!
//! One textual rule has the surface form `[ expr ] <> [ expr ]`. Each side
//! compiles into an annotation tree wrapped in a token node; together they
//! form a [`RulePair`] whose direction of application is decided later.
//!
//! An expression is a list of operands joined by `&` or `|`, an operand is a
//! parenthesized expression or a simple term. Simple terms come in three
//! shapes, most specific first:
//!
//! ```text
//! foundry/layer=key    foundry/layer=key:value
//! layer=key            layer=key:value
//! key                  key:value
//! ```
//!
//! Symbols admit backslash escapes (`$\(` reads as `$(`); the backslash is
//! consumed, the escaped character retained. Fields a term leaves unset are
//! filled from the enclosing list's defaults, upper side from the A side,
//! lower side from the B side.

use std::iter::Peekable;
use std::str::CharIndices;

use koral_ast::{Node, Relation, Term, TermGroup, Token};
use thiserror::Error;

use crate::list::ListDefaults;

/// Characters that terminate a symbol unless escaped.
const SPECIALS: &str = "&|()[]=:/<>";

/// A compiled bidirectional rule: both sides as token-wrapped trees.
#[derive(Clone, Debug, PartialEq)]
pub struct RulePair {
    pub upper: Node,
    pub lower: Node,
}

/// Parse failure of a single mapping rule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("rule sides must be enclosed in brackets")]
    MissingBracket,
    #[error("unbalanced brackets")]
    UnbalancedBracket,
    #[error("unbalanced parentheses")]
    UnbalancedParen,
    #[error("expected operator <> but found {0:?}")]
    UnknownOperator(String),
    #[error("empty pattern")]
    EmptyPattern,
    #[error("unexpected character {0:?} at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of pattern")]
    UnexpectedEnd,
    #[error("unexpected input after closing bracket")]
    TrailingInput,
}

/// Compiles one textual rule into a [`RulePair`], filling unset term fields
/// from the list defaults.
pub fn parse_rule(input: &str, defaults: &ListDefaults) -> Result<RulePair, GrammarError> {
    let (lhs, rhs) = split_sides(input)?;
    let mut upper = parse_side(lhs)?;
    let mut lower = parse_side(rhs)?;
    fill_defaults(&mut upper, &defaults.foundry_a, &defaults.layer_a);
    fill_defaults(&mut lower, &defaults.foundry_b, &defaults.layer_b);
    Ok(RulePair {
        upper: wrap_token(upper),
        lower: wrap_token(lower),
    })
}

/// Splits `[lhs] <> [rhs]` into its bracketed sides.
fn split_sides(input: &str) -> Result<(&str, &str), GrammarError> {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix('[') else {
        return Err(GrammarError::MissingBracket);
    };
    let end = find_unescaped(rest, ']').ok_or(GrammarError::UnbalancedBracket)?;
    let lhs = &rest[..end];
    let mid = rest[end + 1..].trim_start();
    let Some(after_op) = mid.strip_prefix("<>") else {
        let found: String = mid
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != '[')
            .collect();
        return Err(GrammarError::UnknownOperator(found));
    };
    let Some(rhs_rest) = after_op.trim_start().strip_prefix('[') else {
        return Err(GrammarError::MissingBracket);
    };
    let end = find_unescaped(rhs_rest, ']').ok_or(GrammarError::UnbalancedBracket)?;
    if !rhs_rest[end + 1..].trim().is_empty() {
        return Err(GrammarError::TrailingInput);
    }
    Ok((lhs, &rhs_rest[..end]))
}

/// Byte offset of the first unescaped occurrence of `target`.
fn find_unescaped(input: &str, target: char) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == target {
            return Some(idx);
        }
    }
    None
}

fn parse_side(input: &str) -> Result<Node, GrammarError> {
    let mut parser = SideParser::new(input);
    let node = parser.parse_expr()?;
    parser.skip_ws();
    match parser.peek() {
        None => Ok(node),
        Some(c) => Err(GrammarError::UnexpectedChar(c, parser.offset())),
    }
}

fn wrap_token(node: Node) -> Node {
    Node::Token(Token {
        wrap: Some(Box::new(node)),
        rewrites: Vec::new(),
    })
}

/// Fills unset foundry/layer fields from list defaults. Unlike a request
/// override this never touches a field the rule set explicitly.
fn fill_defaults(node: &mut Node, foundry: &str, layer: &str) {
    match node {
        Node::Term(term) => {
            if term.foundry.is_empty() && !foundry.is_empty() {
                term.foundry = foundry.to_string();
            }
            if term.layer.is_empty() && !layer.is_empty() {
                term.layer = layer.to_string();
            }
        }
        Node::Group(group) => {
            for operand in &mut group.operands {
                fill_defaults(operand, foundry, layer);
            }
        }
        Node::Token(token) => {
            if let Some(wrap) = &mut token.wrap {
                fill_defaults(wrap, foundry, layer);
            }
        }
        // the grammar never produces foreign nodes
        Node::Foreign(_) => {}
    }
}

struct SideParser<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> SideParser<'a> {
    fn new(input: &'a str) -> Self {
        SideParser {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map_or(self.input.len(), |(idx, _)| *idx)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn parse_expr(&mut self) -> Result<Node, GrammarError> {
        let mut operands = vec![self.parse_operand()?];
        // a mixed &/| list stays one flat group; the last operator read
        // fixes the relation
        let mut relation = Relation::And;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('&') => {
                    self.bump();
                    relation = Relation::And;
                }
                Some('|') => {
                    self.bump();
                    relation = Relation::Or;
                }
                _ => break,
            }
            operands.push(self.parse_operand()?);
        }
        if operands.len() == 1 {
            Ok(operands.remove(0))
        } else {
            Ok(Node::Group(TermGroup {
                operands,
                relation,
                rewrites: Vec::new(),
            }))
        }
    }

    fn parse_operand(&mut self) -> Result<Node, GrammarError> {
        self.skip_ws();
        if self.peek() == Some('(') {
            self.bump();
            let node = self.parse_expr()?;
            self.skip_ws();
            match self.bump() {
                Some(')') => Ok(node),
                _ => Err(GrammarError::UnbalancedParen),
            }
        } else {
            self.parse_term()
        }
    }

    fn parse_term(&mut self) -> Result<Node, GrammarError> {
        let first = self.symbol()?;
        let mut term = Term::default();
        match self.peek() {
            Some('/') => {
                self.bump();
                term.foundry = first;
                term.layer = self.symbol()?;
                match self.bump() {
                    Some('=') => {}
                    Some(c) => return Err(GrammarError::UnexpectedChar(c, self.offset())),
                    None => return Err(GrammarError::UnexpectedEnd),
                }
                term.key = self.symbol()?;
            }
            Some('=') => {
                self.bump();
                term.layer = first;
                term.key = self.symbol()?;
            }
            _ => term.key = first,
        }
        if self.peek() == Some(':') {
            self.bump();
            term.value = self.symbol()?;
        }
        Ok(Node::Term(term))
    }

    fn symbol(&mut self) -> Result<String, GrammarError> {
        self.skip_ws();
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some(escaped) => out.push(escaped),
                        None => return Err(GrammarError::UnexpectedEnd),
                    }
                }
                Some(c) if SPECIALS.contains(c) || c.is_whitespace() => break,
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
                None => break,
            }
        }
        if out.is_empty() {
            match self.peek() {
                Some(c) => Err(GrammarError::UnexpectedChar(c, self.offset())),
                None => Err(GrammarError::EmptyPattern),
            }
        } else {
            Ok(out)
        }
    }
}
