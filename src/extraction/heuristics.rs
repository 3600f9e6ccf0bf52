// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Regex and line-heuristic field extraction
//!
//! Best-effort pattern matching over normalized OCR text. Produces standard
//! fields only; dynamic fields come exclusively from the vision path. Pure,
//! deterministic, no network calls. The first matching line or pattern in
//! document order wins, with no scoring across candidates.

use regex::Regex;

use super::types::{FieldSet, StandardField};

/// Legal-entity keywords that mark a line as a company name
const COMPANY_KEYWORDS: [&str; 9] = [
    "Inc",
    "LLC",
    "Ltd",
    "Corp",
    "Corporation",
    "Company",
    "Co",
    "Group",
    "Industries",
];

/// Job-title keywords (matched case-insensitively)
const TITLE_KEYWORDS: [&str; 21] = [
    "CEO",
    "CTO",
    "CFO",
    "COO",
    "President",
    "Director",
    "Manager",
    "Lead",
    "Senior",
    "Junior",
    "Engineer",
    "Developer",
    "Designer",
    "Analyst",
    "Consultant",
    "Specialist",
    "Executive",
    "Vice President",
    "VP",
    "Head of",
    "Chief",
];

/// Street-type keywords for address detection
const STREET_KEYWORDS: [&str; 12] = [
    "Street",
    "St",
    "Avenue",
    "Ave",
    "Road",
    "Rd",
    "Drive",
    "Dr",
    "Lane",
    "Ln",
    "Boulevard",
    "Blvd",
];

/// Heuristic field extractor with pre-compiled patterns
pub struct HeuristicParser {
    email_re: Regex,
    phone_re: Regex,
    url_re: Regex,
    us_zip_re: Regex,
    intl_postcode_re: Regex,
}

impl Default for HeuristicParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicParser {
    pub fn new() -> Self {
        Self {
            email_re: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
            phone_re: Regex::new(r"(\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}")
                .unwrap(),
            url_re: Regex::new(
                r"(https?://)?(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()@:%_+.~#?&/=]*",
            )
            .unwrap(),
            us_zip_re: Regex::new(r"\d{5}(-\d{4})?").unwrap(),
            intl_postcode_re: Regex::new(r"\b[A-Z]{1,2}\d{1,2}[A-Z]?\s?\d[A-Z]{2}\b").unwrap(),
        }
    }

    /// Parse normalized OCR text into a best-effort field set
    pub fn parse(&self, text: &str) -> FieldSet {
        let mut fields = FieldSet::new();
        let lines: Vec<&str> = text
            .split('\n')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        if let Some(email) = self.extract_email(text) {
            fields.set_field(StandardField::Email, email);
        }
        if let Some(phone) = self.extract_phone(text) {
            fields.set_field(StandardField::Phone, phone);
        }
        if let Some(website) = self.extract_website(text) {
            fields.set_field(StandardField::Website, &website);
        }
        if let Some(name) = extract_name(&lines) {
            fields.set_field(StandardField::FullName, name);
        }
        if let Some(company) = extract_company(&lines) {
            fields.set_field(StandardField::Company, company);
        }
        if let Some(designation) = extract_designation(&lines) {
            fields.set_field(StandardField::Designation, designation);
        }
        if let Some(address) = self.extract_address(&lines) {
            fields.set_field(StandardField::Address, &address);
        }

        fields
    }

    fn extract_email<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.email_re.find(text).map(|m| m.as_str())
    }

    /// First generic digit-grouping match, returned exactly as matched
    fn extract_phone<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.phone_re.find(text).map(|m| m.as_str().trim())
    }

    /// First URL-like match that is not an email; schemeless matches get
    /// an `https://` prefix
    fn extract_website(&self, text: &str) -> Option<String> {
        self.url_re
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|m| !m.contains('@') && (m.contains("http") || m.contains("www")))
            .map(|url| {
                if url.starts_with("http") {
                    url.to_string()
                } else {
                    format!("https://{}", url)
                }
            })
    }

    /// Reconstruct an address from street or postal-code lines
    ///
    /// The street-keyword rule runs over the whole document before the
    /// postal-code rule is tried. A street line is joined with the following
    /// line (city/state/zip) and a postal-code line with the preceding one,
    /// unless the neighbor looks like an email or URL.
    fn extract_address(&self, lines: &[&str]) -> Option<String> {
        // Street rule: digit + street-type keyword
        for (i, line) in lines.iter().enumerate() {
            if line.contains('@') || line.contains("http") || line.contains("www") {
                continue;
            }
            let has_digit = line.chars().any(|c| c.is_ascii_digit());
            if has_digit && STREET_KEYWORDS.iter().any(|k| line.contains(k)) {
                if let Some(next) = lines.get(i + 1) {
                    if !next.contains('@') && !next.contains("http") {
                        return Some(format!("{}, {}", line, next));
                    }
                }
                return Some(line.to_string());
            }
        }

        // Postal-code rule: US zip or international pattern
        for (i, line) in lines.iter().enumerate() {
            if line.contains('@') || line.contains("http") || line.contains("www") {
                continue;
            }
            if self.us_zip_re.is_match(line) || self.intl_postcode_re.is_match(line) {
                if i > 0 {
                    let prev = lines[i - 1];
                    if !prev.contains('@') && !prev.contains("http") && !starts_with_digit(prev) {
                        return Some(format!("{}, {}", prev, line));
                    }
                }
                return Some(line.to_string());
            }
        }

        None
    }
}

fn starts_with_digit(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Lines that look like contact data rather than prose
fn is_contact_line(line: &str) -> bool {
    line.contains('@') || starts_with_digit(line) || line.contains("http") || line.contains("www")
}

fn capitalized_word_count(words: &[&str]) -> usize {
    words
        .iter()
        .filter(|w| w.chars().next().is_some_and(|c| c.is_ascii_uppercase()))
        .count()
}

/// A name is a prominent line of 2-4 words, at least 2 capitalized
fn extract_name<'a>(lines: &[&'a str]) -> Option<&'a str> {
    for line in lines.iter().take(5) {
        if is_contact_line(line) {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if (2..=4).contains(&words.len()) && capitalized_word_count(&words) >= 2 {
            return Some(line);
        }
    }
    None
}

/// A company is a line with a legal-entity keyword, or failing that the
/// first capitalized line of 3 or more words
fn extract_company<'a>(lines: &[&'a str]) -> Option<&'a str> {
    for line in lines {
        if is_contact_line(line) {
            continue;
        }
        if COMPANY_KEYWORDS.iter().any(|k| line.contains(k)) {
            return Some(line);
        }
    }

    for line in lines {
        if is_contact_line(line) {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() >= 3 && capitalized_word_count(&words) >= 2 {
            return Some(line);
        }
    }

    None
}

/// A designation is any line containing a job-title keyword
fn extract_designation<'a>(lines: &[&'a str]) -> Option<&'a str> {
    for line in lines {
        if is_contact_line(line) {
            continue;
        }
        let lower = line.to_lowercase();
        if TITLE_KEYWORDS
            .iter()
            .any(|k| lower.contains(&k.to_lowercase()))
        {
            return Some(line);
        }
    }
    None
}
