// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

/*!
Mapping rule grammar and rule-list configuration.

A mapping list pairs an identifier and default foundry/layer metadata with an
ordered set of textual rules of the shape `[pattern] <> [pattern]`. The
[`grammar`] module compiles one rule into a bidirectional pair of annotation
trees, [`list`] models the YAML rule-list objects and compiles whole lists,
[`config`] covers the accepted configuration file shapes, and [`title`]
parses the annotation atoms found in snippet `title` attributes.
*/

pub mod config;
pub mod grammar;
pub mod list;
pub mod title;

mod error;

pub use config::{ConfigFile, MapperConfig, load_sources};
pub use error::RuleError;
pub use grammar::{GrammarError, RulePair, parse_rule};
pub use list::{CompiledList, ListDefaults, ListKind, MappingList};
pub use title::parse_title;
