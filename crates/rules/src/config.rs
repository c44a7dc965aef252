// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration file shapes.
//!
//! Two shapes are accepted wherever a YAML source is read: the current shape
//! is a mapping with optional service settings and a `lists` array, the
//! legacy shape a bare array of rule-list objects. Per-list files may also
//! hold a single rule-list object. [`load_sources`] merges a main config and
//! any number of per-list sources into one compiled set, rejecting duplicate
//! ids across all of them.

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::list::{CompiledList, MappingList};

/// The current configuration shape. Everything is optional; service-level
/// settings are consumed by the front-end, `lists` by the engine.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MapperConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, rename = "serviceURL", skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, rename = "cookieName", skip_serializing_if = "Option::is_none")]
    pub cookie_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loglevel: Option<String>,
    #[serde(default)]
    pub lists: Vec<MappingList>,
}

/// One parsed YAML source in any of the accepted shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConfigFile {
    /// Legacy shape: a bare array of rule lists.
    Lists(Vec<MappingList>),
    /// A single rule list, the usual shape of a per-list file.
    Single(Box<MappingList>),
    /// The current shape with service settings.
    Full(MapperConfig),
}

impl ConfigFile {
    /// Parses one YAML source. An empty or whitespace-only source is a
    /// configuration error, not an empty list set.
    pub fn from_yaml(input: &str) -> Result<Self, RuleError> {
        if input.trim().is_empty() {
            return Err(RuleError::EmptyConfig);
        }
        Ok(serde_yaml::from_str(input)?)
    }

    fn into_lists(self) -> (Option<MapperConfig>, Vec<MappingList>) {
        match self {
            ConfigFile::Lists(lists) => (None, lists),
            ConfigFile::Single(list) => (None, vec![*list]),
            ConfigFile::Full(mut config) => {
                let lists = std::mem::take(&mut config.lists);
                (Some(config), lists)
            }
        }
    }
}

/// Merges a main config and per-list sources, in that order, and compiles
/// every list. Returns the service settings of the main config (defaulted
/// when only per-list sources are given) alongside the compiled lists.
pub fn load_sources(
    main: Option<&str>,
    list_sources: &[&str],
) -> Result<(MapperConfig, Vec<CompiledList>), RuleError> {
    let mut config = MapperConfig::default();
    let mut lists: Vec<MappingList> = Vec::new();
    if let Some(source) = main {
        let (parsed, mut main_lists) = ConfigFile::from_yaml(source)?.into_lists();
        if let Some(parsed) = parsed {
            config = parsed;
        }
        lists.append(&mut main_lists);
    }
    for source in list_sources {
        let (_, mut more) = ConfigFile::from_yaml(source)?.into_lists();
        lists.append(&mut more);
    }
    let mut seen = BTreeSet::new();
    for list in &lists {
        if !seen.insert(list.id.as_str()) {
            return Err(RuleError::DuplicateId(list.id.clone()));
        }
    }
    if lists.is_empty() {
        return Err(RuleError::NoLists);
    }
    let compiled = lists
        .iter()
        .map(MappingList::compile)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((config, compiled))
}
