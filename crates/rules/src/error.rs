// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

use crate::grammar::GrammarError;

/// Configuration and rule-compilation failures. All of these are fatal at
/// startup; none can occur per request.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("empty configuration source")]
    EmptyConfig,
    #[error("malformed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("no mapping lists configured")]
    NoLists,
    #[error("duplicate list id {0:?}")]
    DuplicateId(String),
    #[error("list {id:?} has no mappings")]
    EmptyMappings { id: String },
    #[error("list {id:?}, rule {index}: empty rule")]
    EmptyRule { id: String, index: usize },
    #[error("list {id:?}, rule {index}: {source}")]
    Grammar {
        id: String,
        index: usize,
        source: GrammarError,
    },
}
