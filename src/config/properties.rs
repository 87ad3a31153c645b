//! Flat `key=value` properties codec.
//!
//! Reads the line-oriented format used by the suite's config files:
//! - `key=value`, `key: value` or `key value` assignments
//! - `#` and `!` comment lines, blank lines
//! - trailing-backslash line continuation
//! - `\t \n \r \f \\ \uXXXX` escapes (any other escaped char is literal)
//!
//! Writes sorted `key=value` lines under a header comment and a
//! human-readable timestamp line.

use chrono::Local;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key/value pairs held by a config store. Keys are unique.
pub type PropertySet = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum PropertiesError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse properties text. Later duplicates of a key win.
pub fn parse(text: &str) -> PropertySet {
    let mut set = PropertySet::new();
    for line in logical_lines(text) {
        let (key, value) = split_assignment(&line);
        set.insert(key, value);
    }
    set
}

/// Join continuation lines and drop blanks and comments.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for raw in text.lines() {
        let trimmed = raw.trim_start_matches([' ', '\t', '\u{c}']);

        let mut current = match pending.take() {
            Some(mut acc) => {
                acc.push_str(trimmed);
                acc
            }
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed.to_string()
            }
        };

        if ends_with_continuation(&current) {
            current.pop();
            pending = Some(current);
        } else {
            lines.push(current);
        }
    }

    // A continuation on the last line just ends the entry.
    if let Some(rest) = pending {
        lines.push(rest);
    }

    lines
}

/// An odd run of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_assignment(line: &str) -> (String, String) {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut key_end = chars.len();

    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = i;
                break;
            }
            _ => i += 1,
        }
    }

    let key_raw: String = chars[..key_end.min(chars.len())].iter().collect();

    let mut j = key_end;
    while j < chars.len() && matches!(chars[j], ' ' | '\t' | '\u{c}') {
        j += 1;
    }
    if j < chars.len() && matches!(chars[j], '=' | ':') {
        j += 1;
        while j < chars.len() && matches!(chars[j], ' ' | '\t' | '\u{c}') {
            j += 1;
        }
    }

    let value_raw: String = chars[j.min(chars.len())..].iter().collect();
    (unescape(&key_raw), unescape(&value_raw))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => match hex4(&chars) {
                // High surrogate: combine with a following `\uXXXX` low surrogate.
                Some(high @ 0xD800..=0xDBFF) => {
                    let mut ahead = chars.clone();
                    ahead.nth(3);
                    let low = match (ahead.next(), ahead.next()) {
                        (Some('\\'), Some('u')) => {
                            hex4(&ahead).filter(|low| (0xDC00..=0xDFFF).contains(low))
                        }
                        _ => None,
                    };
                    match low.and_then(|low| {
                        char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
                    }) {
                        Some(decoded) => {
                            out.push(decoded);
                            chars.nth(9);
                        }
                        None => out.push_str("\\u"),
                    }
                }
                Some(unit) => match char::from_u32(unit) {
                    Some(decoded) => {
                        out.push(decoded);
                        chars.nth(3);
                    }
                    None => out.push_str("\\u"),
                },
                // Malformed escape: keep it verbatim.
                None => out.push_str("\\u"),
            },
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}

/// The next four characters as a UTF-16 code unit, without consuming them.
fn hex4(chars: &std::str::Chars<'_>) -> Option<u32> {
    let hex: String = chars.clone().take(4).collect();
    if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok()
}

// =============================================================================
// Rendering
// =============================================================================

/// Render a property set with a header comment and a timestamp line.
pub fn render(set: &PropertySet, header: &str) -> String {
    let timestamp = Local::now().format("%a %b %d %H:%M:%S %Y").to_string();
    render_with_timestamp(set, header, &timestamp)
}

pub fn render_with_timestamp(set: &PropertySet, header: &str, timestamp: &str) -> String {
    let mut out = String::new();
    for line in header.lines() {
        out.push_str("# ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("# ");
    out.push_str(timestamp);
    out.push('\n');

    for (key, value) in set {
        out.push_str(&escape(key, true));
        out.push('=');
        out.push_str(&escape(value, false));
        out.push('\n');
    }
    out
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\f"),
            ' ' if is_key || idx == 0 => out.push_str("\\ "),
            '=' | ':' if is_key => {
                out.push('\\');
                out.push(c);
            }
            '#' | '!' if is_key && idx == 0 => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

// =============================================================================
// File I/O
// =============================================================================

/// Read and parse a properties file.
pub fn read_file(path: &Path) -> Result<PropertySet, PropertiesError> {
    let text = fs::read_to_string(path).map_err(|source| PropertiesError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse(&text))
}

/// Write a property set, creating missing parent directories.
pub fn write_file(path: &Path, set: &PropertySet, header: &str) -> Result<(), PropertiesError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PropertiesError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, render(set, header)).map_err(|source| PropertiesError::Write {
        path: path.to_path_buf(),
        source,
    })
}
