// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use koral_ast::NodeError;
use koral_rules::RuleError;
use thiserror::Error;

use crate::matcher::MatcherError;
use crate::snippet::SnippetError;

/// Request-level failure of the engine. Everything here surfaces by return
/// value; the engine never panics on request input.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("mapping list not found: {0:?}")]
    UnknownList(String),
    #[error("list {0:?} does not map annotations")]
    CorpusList(String),
    #[error("unknown direction {0:?}")]
    BadDirection(String),
    #[error("response payload must carry a snippet string")]
    MissingSnippet,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error(transparent)]
    Matcher(#[from] MatcherError),
    #[error(transparent)]
    Snippet(#[from] SnippetError),
    #[error(transparent)]
    Rules(#[from] RuleError),
}
