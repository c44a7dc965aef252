// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Parser for the annotation micro-language of snippet `title` attributes.
//!
//! A title holds a semicolon- or newline-delimited list of atoms shaped
//! `foundry/layer:key`, optionally continuing with a `:value` or `=value`
//! suffix (`marmot/m:gender:masc`, `tt/pos:ADJA`). Atoms always denote an
//! equality match. Malformed atoms are skipped rather than rejected; titles
//! arrive from external search components and a single stray atom must not
//! fail a whole snippet.

use koral_ast::Term;

/// Parses a `title` attribute into its annotation terms.
pub fn parse_title(input: &str) -> Vec<Term> {
    input.split([';', '\n']).filter_map(parse_atom).collect()
}

fn parse_atom(atom: &str) -> Option<Term> {
    let atom = atom.trim();
    let (foundry, rest) = atom.split_once('/')?;
    let (layer, rest) = rest.split_once(':')?;
    let (key, value) = match rest.split_once('=') {
        Some(parts) => parts,
        None => rest.split_once(':').unwrap_or((rest, "")),
    };
    if foundry.is_empty() || layer.is_empty() || key.is_empty() {
        return None;
    }
    Some(Term {
        foundry: foundry.to_string(),
        layer: layer.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        ..Default::default()
    })
}
