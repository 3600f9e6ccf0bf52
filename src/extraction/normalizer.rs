// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR text cleanup
//!
//! Strips OCR noise artifacts (stray punctuation, single-character misreads)
//! while deliberately keeping short numeric fragments like phone digits and
//! postal codes. Pure and idempotent.

/// Clean OCR text by removing noise while preserving important information
///
/// Collapses runs of horizontal whitespace, then drops any line that has
/// fewer than 2 alphanumeric characters, no digit+letter combination, and
/// 3 or fewer characters. Line structure is otherwise preserved.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lines: Vec<String> = text
        .split('\n')
        .map(collapse_spaces)
        .filter(|line| keep_line(line))
        .collect();

    lines.join("\n").trim().to_string()
}

/// Collapse runs of spaces and tabs to a single space, trimming the ends
fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_gap = false;
    for ch in line.chars() {
        if ch == ' ' || ch == '\t' {
            in_gap = true;
        } else {
            if in_gap && !out.is_empty() {
                out.push(' ');
            }
            in_gap = false;
            out.push(ch);
        }
    }
    out
}

/// A line survives if it has at least 2 alphanumerics, or both a digit and
/// a letter, or is longer than 3 characters
fn keep_line(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }

    let alphanumeric_count = line.chars().filter(|c| c.is_ascii_alphanumeric()).count();
    let has_digit = line.chars().any(|c| c.is_ascii_digit());
    let has_letter = line.chars().any(|c| c.is_ascii_alphabetic());

    alphanumeric_count >= 2 || (has_digit && has_letter) || line.chars().count() > 3
}
