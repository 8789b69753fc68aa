// src/template.rs
//! `{{NAME}}` placeholder substitution plus the small text helpers generated
//! pages need (slugs, long dates, thousands separators).

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;

fn placeholder_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\{\{([A-Z0-9_]+)\}\}").expect("static placeholder regex"))
}

/// Replace every `{{NAME}}` that has a value in `vars`. Unknown placeholders
/// are left untouched so they can be reported by [`placeholders`].
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> String {
    placeholder_re()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            vars.get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Names of placeholders still present in `text`.
pub fn placeholders(text: &str) -> BTreeSet<String> {
    placeholder_re()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// URL slug: lowercase, non-word characters removed, runs of spaces and
/// hyphens collapsed to one hyphen.
pub fn slugify(s: &str) -> String {
    static NON_WORD: OnceCell<Regex> = OnceCell::new();
    static SEP: OnceCell<Regex> = OnceCell::new();
    let non_word = NON_WORD.get_or_init(|| Regex::new(r"[^\w\s-]").expect("static slug regex"));
    let sep = SEP.get_or_init(|| Regex::new(r"[-\s]+").expect("static slug regex"));

    let lower = s.to_lowercase();
    let stripped = non_word.replace_all(&lower, "");
    let joined = sep.replace_all(&stripped, "-");
    joined.trim_matches('-').to_string()
}

/// `2025-07-29` → `July 29, 2025`. Inputs that are not calendar dates are
/// returned unchanged.
pub fn long_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(d) => d.format("%B %-d, %Y").to_string(),
        Err(_) => date.to_string(),
    }
}

/// `2025-07-29` → `July 2025`.
pub fn month_year(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(d) => d.format("%B %Y").to_string(),
        Err(_) => date.to_string(),
    }
}

/// `2500` → `2,500`.
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
