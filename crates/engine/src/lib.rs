// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

/*!
The rewriting engine for KoralQuery annotation trees and snippets.

It provides APIs for matching compiled mapping rules against annotation
trees, replacing matched subtrees, and rewriting annotated snippet
fragments:

- [`TreeMatcher`] matches one oriented rule and produces replacement trees.
- [`driver`] applies whole rule lists under a [`Direction`] and per-request
  [`Overrides`].
- [`rewrite_snippet`] rewrites annotated HTML fragments token by token.
- [`Engine`] is the façade the front-end holds for the process lifetime.

Everything is immutable once built; requests run concurrently without
synchronization and never share trees.
*/

pub mod driver;
pub mod matcher;
pub mod snippet;

mod engine;
mod error;

pub use driver::{Direction, Overrides};
pub use engine::Engine;
pub use error::EngineError;
pub use matcher::{MatcherError, TreeMatcher};
pub use snippet::{SnippetError, rewrite_snippet};
