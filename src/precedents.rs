//! Structured view of a precedent search answer.
//!
//! `find_legal_precedents` answers in free text, usually a numbered list of
//! cases. This splits it into one match per list entry and pulls out what
//! it can: title, year, court, a short excerpt.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// How closely a precedent bears on the clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    High,
    Medium,
    Low,
}

/// One case pulled from the answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecedentMatch {
    pub id: String,
    pub title: String,
    pub similarity: f64,
    pub excerpt: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    pub jurisdiction: String,
    pub relevance: Relevance,
    pub risk_level: Relevance,
}

/// Precedent search result: raw answer plus parsed matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Precedents {
    pub text: String,
    pub matches: Vec<PrecedentMatch>,
}

impl Precedents {
    pub fn parse(text: String) -> Self {
        let matches = parse_matches(&text);
        Self { text, matches }
    }
}

const DEFAULT_EXCERPT: &str = "Relevant legal precedent found for this clause.";
const EXCERPT_PREVIEW_CHARS: usize = 200;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|e| panic!("invalid pattern {pattern}: {e}")))
}

fn list_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?:^|\n)\s*\d+\.[ \t]*")
}

fn year_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\b(?:19|20)\d{2}\b")
}

fn court_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?i)(Supreme Court|Court of Appeals|District Court|Federal Court|State Court|High Court)",
    )
}

fn principle_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)(?:Key Principle|Relevance|Principle)[:\s]*([^.]+)")
}

/// Split a precedents answer into matches.
///
/// Non-empty text that yields no list entries becomes a single summary match.
pub fn parse_matches(text: &str) -> Vec<PrecedentMatch> {
    let mut matches: Vec<PrecedentMatch> = list_marker()
        .split(text)
        .filter(|section| !section.trim().is_empty())
        .enumerate()
        .filter_map(|(index, section)| parse_section(index, section))
        .collect();

    if matches.is_empty() && !text.trim().is_empty() {
        matches.push(summary_match(text));
    }
    matches
}

fn parse_section(index: usize, section: &str) -> Option<PrecedentMatch> {
    let first_line = section.lines().find(|line| !line.trim().is_empty())?;
    let title = first_line.replace("**", "").trim().to_string();

    let year = year_pattern()
        .find(section)
        .and_then(|m| m.as_str().parse().ok());

    let (source, jurisdiction) = match court_pattern().find(section) {
        Some(court) => {
            let lower = court.as_str().to_lowercase();
            let jurisdiction = if lower.contains("federal") || lower.contains("supreme") {
                "Federal"
            } else {
                "State"
            };
            (court.as_str().to_string(), jurisdiction.to_string())
        }
        None => ("Court Decision".to_string(), "US".to_string()),
    };

    let excerpt = match principle_pattern().captures(section) {
        Some(caps) => caps[1].trim().to_string(),
        None => {
            let sentences: Vec<&str> = section
                .split('.')
                .filter(|s| s.trim().len() > 20)
                .collect();
            match sentences.get(1) {
                Some(sentence) => format!("{}...", sentence.trim()),
                None => String::new(),
            }
        }
    };

    let lower = section.to_lowercase();
    let relevance = if index < 2 || lower.contains("landmark") || lower.contains("significant") {
        Relevance::High
    } else if index >= 4 {
        Relevance::Low
    } else {
        Relevance::Medium
    };

    Some(PrecedentMatch {
        id: format!("case-{}", index + 1),
        title: if title.is_empty() {
            format!("Case {}", index + 1)
        } else {
            title
        },
        similarity: (0.95 - index as f64 * 0.1).max(0.6),
        excerpt: if excerpt.is_empty() {
            DEFAULT_EXCERPT.to_string()
        } else {
            excerpt
        },
        source,
        year,
        jurisdiction,
        relevance,
        risk_level: match relevance {
            Relevance::High => Relevance::Medium,
            _ => Relevance::Low,
        },
    })
}

fn summary_match(text: &str) -> PrecedentMatch {
    let preview: String = text.chars().take(EXCERPT_PREVIEW_CHARS).collect();
    PrecedentMatch {
        id: "case-1".to_string(),
        title: "Legal Precedent Analysis".to_string(),
        similarity: 0.85,
        excerpt: format!("{}...", preview),
        source: "Legal Research".to_string(),
        year: None,
        jurisdiction: "US".to_string(),
        relevance: Relevance::Medium,
        risk_level: Relevance::Medium,
    }
}
