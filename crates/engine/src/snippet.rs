// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Snippet Rewriting
//!
//! A snippet is an HTML-like fragment whose `<span>` elements carry inline
//! annotations in their `title` attributes. The rewriter pulls the fragment
//! through a streaming reader, collects one annotation context per text run
//! from the spans open around it, and matches that context against the
//! current rule. A matching token gains one wrapping
//! `<span title="…" class="notinindex">` per annotation the replacement
//! contributes beyond the pattern; the `notinindex` marker tells downstream
//! components the annotation is synthetic and must not join index matching.
//!
//! The original markup is never re-rendered: rewriting collects insertions
//! at token boundaries and merges them into the untouched input bytes.

use koral_ast::{Node, Relation, Term, TermGroup};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use smallvec::SmallVec;
use thiserror::Error;

use koral_rules::parse_title;

use crate::matcher::TreeMatcher;

/// Markup failure inside a snippet. Snippets come from external search
/// components, so these surface as request errors, never panics.
#[derive(Debug, Error)]
pub enum SnippetError {
    #[error("malformed snippet markup: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed snippet markup: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
    #[error("malformed span attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
}

/// One annotated text run: its byte span in the fragment, its character
/// range in the flat text, and the titles of the spans open around it,
/// innermost last.
#[derive(Clone, Debug)]
struct TextRun {
    byte_start: usize,
    byte_end: usize,
    char_start: usize,
    char_end: usize,
    titles: Vec<String>,
}

/// An insertion into the untouched input, in the style of edit merging:
/// positions ascend, nothing is deleted.
struct Edit {
    position: usize,
    inserted_text: String,
}

/// Applies one oriented rule to a snippet fragment.
pub fn rewrite_snippet(input: &str, matcher: &TreeMatcher) -> Result<String, SnippetError> {
    let runs = tokenize(input)?;
    let added = added_terms(matcher);
    if added.is_empty() {
        return Ok(input.to_string());
    }
    let mut edits = Vec::new();
    for run in &runs {
        let terms: Vec<Term> = run
            .titles
            .iter()
            .flat_map(|title| parse_title(title))
            .collect();
        let Some(subject) = annotation_context(terms) else {
            continue;
        };
        if !matcher.is_match(&subject) {
            continue;
        }
        let mut opening = String::new();
        for term in &added {
            opening.push_str("<span title=\"");
            opening.push_str(&escape(&*span_title(term)));
            opening.push_str("\" class=\"notinindex\">");
        }
        edits.push(Edit {
            position: run.byte_start,
            inserted_text: opening,
        });
        edits.push(Edit {
            position: run.byte_end,
            inserted_text: "</span>".repeat(added.len()),
        });
    }
    Ok(merge_edits(input, edits))
}

/// Streams the fragment and collects annotated text runs. Only `<span>`
/// start/end events and character data matter; anything else passes through
/// untouched. Character positions count the flat text, markup excluded.
fn tokenize(input: &str) -> Result<Vec<TextRun>, SnippetError> {
    let mut reader = Reader::from_str(input);
    let mut stack: SmallVec<[String; 8]> = SmallVec::new();
    let mut runs = Vec::new();
    let mut char_cursor = 0usize;
    loop {
        let event_start = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(start) if start.name().as_ref() == b"span" => {
                let title = start
                    .try_get_attribute("title")?
                    .map(|attr| attr.unescape_value())
                    .transpose()?
                    .unwrap_or_default();
                stack.push(title.into_owned());
            }
            Event::End(end) if end.name().as_ref() == b"span" => {
                stack.pop();
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                let char_start = char_cursor;
                char_cursor += text.chars().count();
                if !stack.is_empty() && !text.trim().is_empty() {
                    runs.push(TextRun {
                        byte_start: event_start,
                        byte_end: reader.buffer_position() as usize,
                        char_start,
                        char_end: char_cursor,
                        titles: stack.to_vec(),
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    runs.sort_by_key(|run| (run.char_start, run.char_end));
    Ok(runs)
}

/// The synthetic match subject of one text run: a bare term for a single
/// annotation, a conjunction for several, nothing for an unannotated run.
fn annotation_context(terms: Vec<Term>) -> Option<Node> {
    let mut terms = terms;
    match terms.len() {
        0 => None,
        1 => Some(Node::Term(terms.remove(0))),
        _ => Some(Node::Group(TermGroup {
            operands: terms.into_iter().map(Node::Term).collect(),
            relation: Relation::And,
            rewrites: Vec::new(),
        })),
    }
}

/// The annotations the replacement contributes beyond the pattern, in
/// replacement order. These become the added wrappers, first one outermost.
fn added_terms(matcher: &TreeMatcher) -> Vec<Term> {
    let pattern_terms = matcher.pattern().terms();
    matcher
        .replacement()
        .terms()
        .into_iter()
        .filter(|term| !pattern_terms.contains(term))
        .cloned()
        .collect()
}

/// Serializes a term for a `title` attribute, `foundry/layer:key` with the
/// value separated by another colon.
fn span_title(term: &Term) -> String {
    let mut title = format!("{}/{}:{}", term.foundry, term.layer, term.key);
    if !term.value.is_empty() {
        title.push(':');
        title.push_str(&term.value);
    }
    title
}

fn merge_edits(input: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|edit| edit.position);
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    for edit in edits {
        debug_assert!(cursor <= edit.position, "edits must be ordered");
        out.push_str(&input[cursor..edit.position]);
        out.push_str(&edit.inserted_text);
        cursor = edit.position;
    }
    out.push_str(&input[cursor..]);
    out
}
