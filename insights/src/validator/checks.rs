//! Individual scoring checks. Each is a pure function of the report text.

use super::config::{ActionabilityRule, CitationKind, SeverityRule, ValidatorConfig};
use super::{Check, Deduction};
use crate::fixtures::FixtureSet;
use regex::Regex;
use std::collections::HashSet;

/// A required section with its markers compiled as word-prefix patterns.
pub(super) struct CompiledSection {
    pub name: String,
    pub markers: Vec<String>,
    pub patterns: Vec<Regex>,
}

pub(super) fn sections(text: &str, rules: &[CompiledSection], points: u32) -> Vec<Deduction> {
    rules
        .iter()
        .filter(|rule| !rule.patterns.iter().any(|p| p.is_match(text)))
        .map(|rule| {
            Deduction::new(
                Check::Sections,
                points,
                format!(
                    "Missing required section '{}' (expected a mention of {})",
                    rule.name,
                    rule.markers.join(" or ")
                ),
            )
        })
        .collect()
}

pub(super) struct CompiledCitation {
    pub kind: CitationKind,
    pub regex: Regex,
    pub example: String,
}

pub(super) fn citations(
    text: &str,
    rules: &[CompiledCitation],
    fixtures: Option<&FixtureSet>,
    config: &ValidatorConfig,
) -> Vec<Deduction> {
    let mut deductions = Vec::new();

    for rule in rules {
        let suggestion = fixtures
            .and_then(|f| suggest(rule.kind, f))
            .unwrap_or_else(|| rule.example.clone());
        let cited: Vec<&str> = rule.regex.find_iter(text).map(|m| m.as_str()).collect();

        if cited.is_empty() {
            deductions.push(Deduction::new(
                Check::Citations,
                config.citation_deduction,
                format!(
                    "No {} cited; reference a specific one such as '{}'",
                    rule.kind.label(),
                    suggestion
                ),
            ));
            continue;
        }

        let Some(fixtures) = fixtures else { continue };
        let Some(known) = known_ids(rule.kind, fixtures) else { continue };

        let mut unknown: Vec<&str> = Vec::new();
        for id in cited {
            if !known.contains(&normalize_id(rule.kind, id)) && !unknown.contains(&id) {
                unknown.push(id);
            }
        }
        if !unknown.is_empty() {
            deductions.push(Deduction::new(
                Check::Citations,
                config.unknown_citation_deduction,
                format!(
                    "Cited {} not found in the fixture data: {}; cite one that exists such as '{}'",
                    rule.kind.label(),
                    unknown.join(", "),
                    suggestion
                ),
            ));
        }
    }

    deductions
}

/// Ids of `kind` present in the fixtures, or `None` when the kind cannot be checked.
fn known_ids(kind: CitationKind, fixtures: &FixtureSet) -> Option<HashSet<String>> {
    let ids: HashSet<String> = match kind {
        CitationKind::Sprint => fixtures
            .sprints()
            .iter()
            .map(|s| normalize_id(kind, &s.sprint_name))
            .collect(),
        CitationKind::TestCycle => fixtures
            .test_cycles()
            .iter()
            .map(|c| c.cycle_name.clone())
            .collect(),
        CitationKind::Incident => fixtures.incidents().iter().map(|i| i.id.clone()).collect(),
        CitationKind::Metric => return None,
    };
    (!ids.is_empty()).then_some(ids)
}

fn normalize_id(kind: CitationKind, id: &str) -> String {
    match kind {
        CitationKind::Sprint => id
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
        _ => id.to_string(),
    }
}

fn suggest(kind: CitationKind, fixtures: &FixtureSet) -> Option<String> {
    match kind {
        CitationKind::Sprint => fixtures.latest_sprint().map(|s| s.sprint_name.clone()),
        CitationKind::TestCycle => fixtures.latest_cycle().map(|c| c.cycle_name.clone()),
        CitationKind::Incident => fixtures
            .incidents()
            .iter()
            .max_by_key(|i| i.reported_at)
            .map(|i| i.id.clone()),
        CitationKind::Metric => fixtures.latest_sprint().map(|s| {
            format!(
                "{} of {} points in {}",
                s.completed_points, s.planned_points, s.sprint_name
            )
        }),
    }
}

/// Distinct actionable recommendation lines, normalized, in order of appearance.
pub fn actionable_lines(text: &str, rule: &ActionabilityRule) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let verbs: HashSet<String> = rule.imperative_verbs.iter().map(|v| v.to_lowercase()).collect();

    let mut candidates: Vec<&str> = Vec::new();
    let mut in_block = false;
    let mut saw_marker = false;
    for &line in &lines {
        if is_block_marker(line, rule) {
            in_block = true;
            saw_marker = true;
            continue;
        }
        if heading_level(line).is_some() {
            in_block = false;
            continue;
        }
        if in_block {
            candidates.push(line);
        }
    }
    if !saw_marker {
        candidates = lines;
    }

    let mut seen = HashSet::new();
    let mut actions = Vec::new();
    for line in candidates {
        let stripped = strip_list_marker(line);
        if !is_actionable(stripped, &verbs, rule) {
            continue;
        }
        let normalized = normalize_line(stripped);
        if seen.insert(normalized.clone()) {
            actions.push(normalized);
        }
    }
    actions
}

pub(super) fn actionability(text: &str, rule: &ActionabilityRule) -> Vec<Deduction> {
    let found = actionable_lines(text, rule).len();
    if found >= rule.min_actions {
        return Vec::new();
    }
    vec![Deduction::new(
        Check::Actionability,
        rule.deduction,
        format!(
            "Only {} specific actionable recommendation(s) found; add at least {} imperative recommendations that name the affected sprint, test or incident",
            found, rule.min_actions
        ),
    )]
}

fn is_block_marker(line: &str, rule: &ActionabilityRule) -> bool {
    let lower = line.to_lowercase();
    line.split_whitespace().count() <= rule.max_marker_words
        && rule.block_markers.iter().any(|m| lower.contains(&m.to_lowercase()))
}

fn is_actionable(line: &str, verbs: &HashSet<String>, rule: &ActionabilityRule) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() < rule.min_words {
        return false;
    }
    let first = words[0]
        .trim_matches(|c: char| !c.is_alphabetic())
        .to_lowercase();
    if !verbs.contains(&first) {
        return false;
    }

    let lower = line.to_lowercase();
    let generic = rule
        .generic_phrases
        .iter()
        .any(|p| lower.contains(&p.to_lowercase()));
    !(generic && !line.chars().any(|c| c.is_ascii_digit()))
}

fn normalize_line(line: &str) -> String {
    line.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Markdown heading depth (`#` count), if the line is a heading.
pub(super) fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 {
        return None;
    }
    match trimmed[level..].chars().next() {
        None => Some(level),
        Some(c) if c.is_whitespace() => Some(level),
        _ => None,
    }
}

fn strip_list_marker(line: &str) -> &str {
    let trimmed = line.trim();
    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = trimmed.strip_prefix(bullet) {
            return rest.trim_start();
        }
    }
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim_start();
        }
    }
    trimmed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStyle {
    Heading,
    Numbered,
    Bulleted,
}

struct Entry<'a> {
    head: &'a str,
    body: Vec<&'a str>,
}

/// Problem entries in the problem-areas section: sub-headings, else numbered items, else bullets.
///
/// Recommendation blocks inside the section are skipped, so action items never count as problems.
fn problem_entries<'a>(
    text: &'a str,
    rule: &SeverityRule,
    actions: &ActionabilityRule,
) -> Vec<Entry<'a>> {
    let lines: Vec<&str> = text.lines().collect();
    let marker = rule.section_marker.to_lowercase();
    let contains_marker = |line: &&str| line.to_lowercase().contains(&marker);

    let start = lines
        .iter()
        .position(|l| heading_level(l).is_some() && contains_marker(l))
        .or_else(|| lines.iter().position(contains_marker));
    let Some(start) = start else {
        return Vec::new();
    };

    let level = heading_level(lines[start]).unwrap_or(2);
    let section = without_action_blocks(
        lines[start + 1..]
            .iter()
            .take_while(|l| heading_level(l).map_or(true, |h| h > level))
            .copied(),
        actions,
    );

    let style = [EntryStyle::Heading, EntryStyle::Numbered, EntryStyle::Bulleted]
        .into_iter()
        .find(|style| section.iter().any(|l| starts_entry(l, *style)));
    let Some(style) = style else {
        return Vec::new();
    };

    let mut entries: Vec<Entry> = Vec::new();
    for line in section {
        if starts_entry(line, style) {
            entries.push(Entry {
                head: line,
                body: Vec::new(),
            });
        } else if let Some(entry) = entries.last_mut() {
            entry.body.push(line);
        }
    }
    entries
}

/// Drop recommendation blocks: a marker line up to the next heading, or the first
/// blank line after the block's content.
fn without_action_blocks<'a>(
    lines: impl Iterator<Item = &'a str>,
    actions: &ActionabilityRule,
) -> Vec<&'a str> {
    let mut kept = Vec::new();
    let mut in_block = false;
    let mut block_has_content = false;
    for line in lines {
        if is_block_marker(line, actions) {
            in_block = true;
            block_has_content = false;
            continue;
        }
        if in_block {
            let ends = heading_level(line).is_some() || (line.trim().is_empty() && block_has_content);
            if !ends {
                block_has_content |= !line.trim().is_empty();
                continue;
            }
            in_block = false;
        }
        kept.push(line);
    }
    kept
}

fn starts_entry(line: &str, style: EntryStyle) -> bool {
    match style {
        EntryStyle::Heading => heading_level(line).is_some(),
        EntryStyle::Numbered => {
            let trimmed = line.trim_start();
            let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
            digits > 0 && (trimmed[digits..].starts_with(". ") || trimmed[digits..].starts_with(") "))
        }
        EntryStyle::Bulleted => {
            let trimmed = line.trim_start();
            ["- ", "* ", "+ "].iter().any(|b| trimmed.starts_with(b))
        }
    }
}

pub(super) struct SeverityPatterns {
    pub token: Regex,
    pub field: Regex,
}

/// Only listed entries are charged; a missing or empty problem section costs nothing here.
pub(super) fn severity(
    text: &str,
    rule: &SeverityRule,
    actions: &ActionabilityRule,
    patterns: &SeverityPatterns,
) -> Vec<Deduction> {
    let labels = rule.labels.join(", ");
    let entries = problem_entries(text, rule, actions);

    let recognized: HashSet<String> = rule.labels.iter().map(|l| l.to_lowercase()).collect();
    let mut deductions = Vec::new();
    let mut spent = 0;

    for entry in entries {
        let title = entry_title(entry.head);
        let fields: Vec<String> = std::iter::once(entry.head)
            .chain(entry.body.iter().copied())
            .flat_map(|line| patterns.field.captures_iter(line))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_lowercase()))
            .collect();

        let message = if let Some(bad) = fields.iter().find(|f| !recognized.contains(*f)) {
            Some(format!(
                "Problem area '{}' has unrecognized severity '{}'; use one of {}",
                title, bad, labels
            ))
        } else if patterns.token.is_match(entry.head) || !fields.is_empty() {
            None
        } else {
            Some(format!(
                "Problem area '{}' has no severity label; tag it {}",
                title, labels
            ))
        };

        if let Some(message) = message {
            let points = rule
                .per_entry_deduction
                .min(rule.max_deduction.saturating_sub(spent));
            spent += points;
            deductions.push(Deduction::new(Check::Severity, points, message));
        }
    }
    deductions
}

fn entry_title(head: &str) -> String {
    let cleaned = strip_list_marker(head.trim_start().trim_start_matches('#'));
    let title: String = cleaned.chars().take(60).collect();
    if cleaned.chars().count() > 60 {
        format!("{}...", title)
    } else {
        title
    }
}

pub(super) fn warnings(text: &str, config: &ValidatorConfig) -> Vec<String> {
    let words = text.split_whitespace().count();
    let mut warnings = Vec::new();
    if words < config.min_words {
        warnings.push(format!(
            "Report is short ({} words); aim for at least {}",
            words, config.min_words
        ));
    } else if words > config.max_words {
        warnings.push(format!(
            "Report is long ({} words); consider condensing below {}",
            words, config.max_words
        ));
    }
    if !text.chars().any(|c| c.is_ascii_digit()) {
        warnings.push("Report should include specific metrics and numbers".to_string());
    }
    warnings
}
