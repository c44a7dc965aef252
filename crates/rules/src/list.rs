// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rule-list objects and their compiled form.
//!
//! A [`MappingList`] is the YAML-facing shape: an id, optional description
//! and default foundry/layer metadata for both sides, and the textual
//! mappings. [`MappingList::compile`] runs every mapping through the grammar
//! once; the resulting [`CompiledList`] is immutable and shared by all
//! requests for its id.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::grammar::{RulePair, parse_rule};

/// What a list applies to. Only annotation lists participate in rewriting;
/// corpus lists are accepted in configuration for forward compatibility and
/// rejected when a request selects them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    #[default]
    Annotation,
    Corpus,
}

/// Default foundry/layer metadata of a list, A side and B side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListDefaults {
    pub foundry_a: String,
    pub layer_a: String,
    pub foundry_b: String,
    pub layer_b: String,
}

/// One rule list as configured.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MappingList {
    /// Unique identifier the request path selects the list by.
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: ListKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, rename = "foundryA")]
    pub foundry_a: String,
    #[serde(default, rename = "layerA")]
    pub layer_a: String,
    #[serde(default, rename = "foundryB")]
    pub foundry_b: String,
    #[serde(default, rename = "layerB")]
    pub layer_b: String,
    /// The textual rules, applied in declaration order.
    #[serde(default)]
    pub mappings: Vec<String>,
}

/// A list with all mappings compiled, cached for the process lifetime.
#[derive(Clone, Debug)]
pub struct CompiledList {
    pub id: String,
    pub kind: ListKind,
    pub rules: Vec<RulePair>,
}

impl MappingList {
    pub fn defaults(&self) -> ListDefaults {
        ListDefaults {
            foundry_a: self.foundry_a.clone(),
            layer_a: self.layer_a.clone(),
            foundry_b: self.foundry_b.clone(),
            layer_b: self.layer_b.clone(),
        }
    }

    /// Compiles every mapping of the list, reporting failures with the list
    /// id and the zero-based rule index.
    pub fn compile(&self) -> Result<CompiledList, RuleError> {
        if self.mappings.is_empty() {
            return Err(RuleError::EmptyMappings {
                id: self.id.clone(),
            });
        }
        let defaults = self.defaults();
        let mut rules = Vec::with_capacity(self.mappings.len());
        for (index, mapping) in self.mappings.iter().enumerate() {
            if mapping.trim().is_empty() {
                return Err(RuleError::EmptyRule {
                    id: self.id.clone(),
                    index,
                });
            }
            let pair = parse_rule(mapping, &defaults).map_err(|source| RuleError::Grammar {
                id: self.id.clone(),
                index,
                source,
            })?;
            rules.push(pair);
        }
        Ok(CompiledList {
            id: self.id.clone(),
            kind: self.kind,
            rules,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::grammar::GrammarError;

    fn list(mappings: &[&str]) -> MappingList {
        MappingList {
            id: "stts-ud".to_string(),
            foundry_a: "opennlp".to_string(),
            layer_a: "p".to_string(),
            foundry_b: "ud".to_string(),
            layer_b: "p".to_string(),
            mappings: mappings.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_compile_applies_defaults_per_side() {
        let compiled = list(&["[PIDAT] <> [DET]"]).compile().expect("compiles");
        assert_eq!(compiled.id, "stts-ud");
        assert_eq!(compiled.kind, ListKind::Annotation);
        assert_eq!(compiled.rules.len(), 1);
        let upper_terms = compiled.rules[0].upper.terms();
        assert_eq!(upper_terms[0].foundry, "opennlp");
        let lower_terms = compiled.rules[0].lower.terms();
        assert_eq!(lower_terms[0].foundry, "ud");
    }

    #[test]
    fn test_empty_mappings_rejected() {
        let err = list(&[]).compile().expect_err("must fail");
        assert!(matches!(err, RuleError::EmptyMappings { id } if id == "stts-ud"));
    }

    #[test]
    fn test_empty_rule_rejected_with_index() {
        let err = list(&["[A] <> [B]", "  "]).compile().expect_err("must fail");
        assert!(matches!(err, RuleError::EmptyRule { index: 1, .. }));
    }

    #[test]
    fn test_grammar_error_carries_context() {
        let err = list(&["[A] <> [B]", "[A] -> [B]"])
            .compile()
            .expect_err("must fail");
        let RuleError::Grammar { id, index, source } = err else {
            panic!("expected a grammar error")
        };
        assert_eq!(id, "stts-ud");
        assert_eq!(index, 1);
        assert_eq!(source, GrammarError::UnknownOperator("->".to_string()));
    }

    #[test]
    fn test_yaml_shape() {
        let parsed: MappingList = serde_yaml::from_str(
            r#"
id: stts-ud
type: annotation
desc: STTS to UD part-of-speech mapping
foundryA: opennlp
layerA: p
mappings:
  - "[PIDAT] <> [DET]"
"#,
        )
        .expect("parses");
        assert_eq!(parsed.id, "stts-ud");
        assert_eq!(parsed.kind, ListKind::Annotation);
        assert_eq!(parsed.foundry_a, "opennlp");
        assert_eq!(parsed.foundry_b, "");
        assert_eq!(parsed.mappings.len(), 1);
    }
}
