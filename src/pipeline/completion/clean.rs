use std::sync::LazyLock;

use regex::Regex;

static BOLD_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*[^*]+\*\*\s*").unwrap());

/// Phrases marking a bullet as the model narrating its own reasoning.
const META_PHRASES: &[&str] = &[
    "combining",
    "therefore",
    "this means",
    "based on",
    "from the",
    "the data",
    "the json",
    "the result",
    "the above",
    "the record",
    "key details",
    "summary",
    "yields",
    "earlier work",
    "reasoning",
];

fn is_meta_bullet(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.starts_with("- ") {
        return false;
    }
    let lower = trimmed.to_lowercase();
    META_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Strip reasoning preambles some hosted models prepend to their answer:
/// bold section headers and meta-commentary bullets. When only bullets
/// remain, the last plain line (or the last bullet's text) is the answer.
pub fn clean_reasoning(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let without_headers = BOLD_HEADER.replace_all(trimmed, "");
    let kept: Vec<&str> = without_headers
        .lines()
        .filter(|line| !is_meta_bullet(line))
        .collect();
    let cleaned = kept.join("\n").trim().to_string();

    if !cleaned.starts_with("- ") {
        return cleaned;
    }

    let lines: Vec<&str> = cleaned.lines().filter(|l| !l.trim().is_empty()).collect();
    if let Some(plain) = lines.iter().rev().find(|l| !l.trim().starts_with("- ")) {
        return plain.trim().to_string();
    }
    lines
        .last()
        .map(|l| l.trim().trim_start_matches("- ").trim().to_string())
        .unwrap_or(cleaned)
}
