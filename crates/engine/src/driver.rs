// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rule-list application.
//!
//! The driver orients every rule of a compiled list by the request
//! direction, applies the per-request foundry/layer overrides to clones of
//! both sides, and runs the rules strictly in declaration order: each rule
//! sees the output of the previous one, no fixed-point iteration.

use std::str::FromStr;

use koral_ast::Node;
use koral_rules::{CompiledList, ListKind, RulePair};

use crate::error::EngineError;
use crate::matcher::TreeMatcher;
use crate::snippet::rewrite_snippet;

/// Which side of a rule is the pattern: `atob` rewrites upper subtrees into
/// lower ones, `btoa` the reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    AtoB,
    BtoA,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::AtoB => "atob",
            Direction::BtoA => "btoa",
        }
    }
}

impl FromStr for Direction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "atob" => Ok(Direction::AtoB),
            "btoa" => Ok(Direction::BtoA),
            other => Err(EngineError::BadDirection(other.to_string())),
        }
    }
}

/// Per-request foundry/layer overrides. Empty strings leave the compiled
/// fields intact; the A-side pair always addresses the upper rule side, the
/// B-side pair the lower one, regardless of direction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Overrides {
    pub foundry_a: String,
    pub layer_a: String,
    pub foundry_b: String,
    pub layer_b: String,
}

/// Orients one rule and applies the overrides to clones of both sides. The
/// compiled rule itself stays untouched, so concurrent requests never see
/// each other's overrides.
fn oriented(
    pair: &RulePair,
    direction: Direction,
    overrides: &Overrides,
) -> Result<TreeMatcher, EngineError> {
    let (mut pattern, mut replacement) = match direction {
        Direction::AtoB => (pair.upper.clone(), pair.lower.clone()),
        Direction::BtoA => (pair.lower.clone(), pair.upper.clone()),
    };
    match direction {
        Direction::AtoB => {
            pattern.apply_overrides(&overrides.foundry_a, &overrides.layer_a);
            replacement.apply_overrides(&overrides.foundry_b, &overrides.layer_b);
        }
        Direction::BtoA => {
            pattern.apply_overrides(&overrides.foundry_b, &overrides.layer_b);
            replacement.apply_overrides(&overrides.foundry_a, &overrides.layer_a);
        }
    }
    Ok(TreeMatcher::new(pattern, replacement)?)
}

fn check_kind(list: &CompiledList) -> Result<(), EngineError> {
    if list.kind == ListKind::Corpus {
        return Err(EngineError::CorpusList(list.id.clone()));
    }
    Ok(())
}

/// Applies a whole list to an annotation tree. With `trail` set, every
/// replaced subtree carries a rewrite entry naming the list as its source.
pub fn apply_to_tree(
    list: &CompiledList,
    direction: Direction,
    overrides: &Overrides,
    tree: &Node,
    trail: bool,
) -> Result<Node, EngineError> {
    check_kind(list)?;
    let mut current = tree.clone();
    for pair in &list.rules {
        let matcher = oriented(pair, direction, overrides)?;
        let src = trail.then_some(list.id.as_str());
        current = matcher.replace(&current, src);
    }
    Ok(current)
}

/// Applies a whole list to a snippet fragment, rule by rule in declaration
/// order like the tree driver.
pub fn apply_to_snippet(
    list: &CompiledList,
    direction: Direction,
    overrides: &Overrides,
    snippet: &str,
) -> Result<String, EngineError> {
    check_kind(list)?;
    let mut current = snippet.to_string();
    for pair in &list.rules {
        let matcher = oriented(pair, direction, overrides)?;
        current = rewrite_snippet(&current, &matcher)?;
    }
    Ok(current)
}
