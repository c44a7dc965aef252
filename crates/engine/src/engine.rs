// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The engine façade.
//!
//! An [`Engine`] owns the compiled rule lists for the process lifetime and
//! is immutable after construction: concurrent requests share it freely,
//! every request works on its own parsed tree and the compiled rules are
//! cloned before any override touches them.

use std::collections::HashMap;

use koral_ast::Node;
use koral_rules::{CompiledList, load_sources};
use serde_json::Value;

use crate::driver::{Direction, Overrides, apply_to_snippet, apply_to_tree};
use crate::error::EngineError;

/// The compiled mapping service: one engine per process, any number of
/// concurrent requests.
#[derive(Debug)]
pub struct Engine {
    lists: HashMap<String, CompiledList>,
}

impl Engine {
    /// Builds an engine over already compiled lists. Ids are unique by
    /// construction; the loader rejects duplicates across all sources.
    pub fn new(lists: Vec<CompiledList>) -> Self {
        Engine {
            lists: lists
                .into_iter()
                .map(|list| (list.id.clone(), list))
                .collect(),
        }
    }

    /// Loads and compiles YAML sources, a main config and/or per-list
    /// files, and returns the service settings alongside the engine.
    pub fn from_yaml_sources(
        main: Option<&str>,
        list_sources: &[&str],
    ) -> Result<(koral_rules::MapperConfig, Engine), EngineError> {
        let (config, lists) = load_sources(main, list_sources)?;
        Ok((config, Engine::new(lists)))
    }

    /// The ids of all loaded lists, in no particular order.
    pub fn list_ids(&self) -> impl Iterator<Item = &str> {
        self.lists.keys().map(String::as_str)
    }

    fn list(&self, id: &str) -> Result<&CompiledList, EngineError> {
        self.lists
            .get(id)
            .ok_or_else(|| EngineError::UnknownList(id.to_string()))
    }

    /// Rewrites a query tree under the given list and direction. `trail`
    /// requests rewrite entries on every replaced subtree.
    pub fn apply_query(
        &self,
        list_id: &str,
        direction: Direction,
        overrides: &Overrides,
        body: &str,
        trail: bool,
    ) -> Result<String, EngineError> {
        let list = self.list(list_id)?;
        let tree = Node::parse_json(body)?;
        let rewritten = apply_to_tree(list, direction, overrides, &tree, trail)?;
        Ok(serde_json::to_string(&rewritten.to_json_value())?)
    }

    /// Rewrites the `snippet` member of a response payload; all other
    /// members pass through untouched.
    pub fn apply_response(
        &self,
        list_id: &str,
        direction: Direction,
        overrides: &Overrides,
        body: &str,
    ) -> Result<String, EngineError> {
        let list = self.list(list_id)?;
        let mut payload: Value = serde_json::from_str(body)?;
        let obj = payload.as_object_mut().ok_or(EngineError::MissingSnippet)?;
        let snippet = obj
            .get("snippet")
            .and_then(Value::as_str)
            .ok_or(EngineError::MissingSnippet)?;
        let rewritten = apply_to_snippet(list, direction, overrides, snippet)?;
        obj.insert("snippet".to_string(), Value::from(rewritten));
        Ok(serde_json::to_string(&payload)?)
    }
}
