//! Markdown reference loader.
//!
//! The operations team maintains policies and precedent cases as numbered
//! sections in plain markdown files. This loader parses those files into
//! the reference library once at startup.
//!
//! Section format: a line starting with a number ("1. Título") opens a new
//! section; everything until the next numbered line belongs to it.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::domain::reference::{
    CaseExample, PolicyCategory, PolicyRule, PolicySeverity, ReferenceLibrary,
};

/// Parses numbered markdown sections into `(title, body)` pairs.
pub fn parse_numbered_sections(content: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in content.lines() {
        let stripped = line.trim();
        let is_header = stripped
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
            && stripped.contains('.')
            && !line.starts_with("  ");

        if is_header {
            if let Some((title, body)) = current.take() {
                sections.push((title, body.join("\n").trim().to_string()));
            }
            current = Some((stripped.to_string(), vec![line]));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some((title, body)) = current.take() {
        sections.push((title, body.join("\n").trim().to_string()));
    }

    sections
}

/// Loads policy and case files into a [`ReferenceLibrary`].
///
/// Missing files are tolerated with a warning and yield the corresponding
/// empty list, so the turn loop can still run on base instructions.
pub fn load_reference_library(
    policies_path: &Path,
    cases_path: &Path,
) -> ReferenceLibrary {
    let policies = load_sections(policies_path)
        .into_iter()
        .enumerate()
        .map(|(i, (title, body))| PolicyRule {
            id: format!("POLITICA_{:03}", i + 1),
            name: title.clone(),
            category: PolicyCategory::Protocolo,
            severity: PolicySeverity::Info,
            applicable_phases: vec![],
            applicable_directions: vec![],
            keywords: keywords_from_title(&title),
            guidance: body,
        })
        .collect::<Vec<_>>();

    let cases = load_sections(cases_path)
        .into_iter()
        .enumerate()
        .map(|(i, (title, body))| CaseExample {
            id: format!("CASO_{:03}", i + 1),
            title: title.clone(),
            keywords: keywords_from_title(&title),
            narrative: body,
        })
        .collect::<Vec<_>>();

    info!(
        policies = policies.len(),
        cases = cases.len(),
        "reference library loaded"
    );
    ReferenceLibrary::new(policies, cases)
}

fn load_sections(path: &Path) -> Vec<(String, String)> {
    match fs::read_to_string(path) {
        Ok(content) => parse_numbered_sections(&content),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "reference file unavailable");
            Vec::new()
        }
    }
}

/// Derives retrieval keywords from a section title: lowercase words of 4+
/// characters, numbering stripped.
fn keywords_from_title(title: &str) -> Vec<String> {
    title
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.len() >= 4 && !w.chars().all(|c| c.is_ascii_digit()))
        .collect()
}
