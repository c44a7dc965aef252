// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

/*!
The annotation tree model for KoralQuery fragments.

A query fragment is a tree of typed nodes: a [`Token`] wraps the annotation
predicate of one corpus position, a [`Term`] is a single predicate over one
annotation, and a [`TermGroup`] combines operands under an `and`/`or`
relation. Node types the mapper does not model natively are preserved
verbatim as [`Foreign`] nodes so whole documents survive a round trip even
when only an inner subtree is understood.

The [`codec`] module converts between [`serde_json::Value`] documents and
[`Node`] trees; [`Rewrite`] is the sidecar trail entry attached to nodes a
mapping rule replaced.
*/

pub mod codec;
mod node;
mod rewrite;

pub use codec::NodeError;
pub use node::{Foreign, MatchOp, Node, Relation, Term, TermGroup, Token};
pub use rewrite::Rewrite;
