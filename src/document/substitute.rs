//! Placeholder substitution across formatting runs.
//!
//! Word editors split one visible string into several runs whenever the
//! formatting, spell-check state or revision id changes, so `<partyname>`
//! may arrive as `"Dear <part"` + `"yname>,"`. Matching is done on the
//! container's logical string (all run texts concatenated) and the result is
//! spliced back into the runs the match overlapped.
//!
//! Every occurrence of a token is replaced. The search resumes after the
//! inserted value, so a value that itself contains the token is not expanded
//! again.

use lazy_static::lazy_static;
use regex::Regex;

use super::model::{Run, TemplateDocument, TextContainer};

lazy_static! {
    static ref TOKEN_PATTERN: Regex = Regex::new(r"<[A-Za-z][A-Za-z0-9_]*>").unwrap();
}

/// Outcome of a substitution pass over a document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SubstitutionReport {
    /// Number of token occurrences replaced.
    pub replaced: usize,
    /// Containers (paragraphs or cells) whose text changed.
    pub containers_changed: usize,
}

/// Replace every token of `placeholders` in every paragraph and table cell
/// of the document, headers and footers included.
///
/// `placeholders` is applied in order; a token absent from the document is
/// not an error.
pub fn replace_placeholders(
    document: &mut TemplateDocument,
    placeholders: &[(String, String)],
) -> SubstitutionReport {
    let mut report = SubstitutionReport::default();
    for mut container in document.containers_mut() {
        let replaced = replace_in_container(&mut container, placeholders);
        if replaced > 0 {
            report.replaced += replaced;
            report.containers_changed += 1;
        }
    }
    report
}

/// Replace tokens within one logical string. Returns the number of
/// occurrences replaced.
pub fn replace_in_container(
    container: &mut TextContainer<'_>,
    placeholders: &[(String, String)],
) -> usize {
    let mut runs = container.runs_mut();
    let mut replaced = 0;

    for (token, value) in placeholders {
        if token.is_empty() {
            continue;
        }
        let mut from = 0;
        loop {
            let logical: String = runs.iter().map(|run| run.text.as_str()).collect();
            let Some(found) = logical.get(from..).and_then(|rest| rest.find(token.as_str()))
            else {
                break;
            };
            let start = from + found;
            splice(&mut runs, start, start + token.len(), value);
            replaced += 1;
            from = start + value.len();
        }
    }

    replaced
}

/// Replace the byte range `start..end` of the logical string with `value`.
///
/// The value lands in the run holding the first character of the match and
/// takes that run's formatting. Later overlapped runs lose only their
/// overlapping portion.
fn splice(runs: &mut [&mut Run], start: usize, end: usize, value: &str) {
    let mut offset = 0;
    let mut first: Option<usize> = None;

    for (index, run) in runs.iter_mut().enumerate() {
        let run_start = offset;
        let run_end = offset + run.text.len();
        offset = run_end;

        if run_end <= start || run_start >= end || run_start == run_end {
            continue;
        }

        let local_start = start.saturating_sub(run_start);
        let local_end = (end - run_start).min(run.text.len());

        match first {
            None => {
                first = Some(index);
                run.replace_range(local_start, local_end, value);
            }
            Some(_) => run.replace_range(0, local_end, ""),
        }
    }
}

/// Bracketed tokens still present in `text`, in order of appearance.
pub fn find_unreplaced_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for found in TOKEN_PATTERN.find_iter(text) {
        let token = found.as_str().to_string();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}
