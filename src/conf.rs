//! Ordered reader/writer for bundle `.conf` files
//!
//! Bundle configuration uses `[section]` headers with `key = value` entries,
//! `#`/`;` comments and indented continuation lines. The document keeps every
//! raw line (including its line ending) so that editing one value and
//! rendering the document back changes only that value's bytes.

use thiserror::Error;

/// A syntax error at a specific line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct ConfParseError {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone)]
enum LineKind {
    Blank,
    Comment,
    Section,
    Entry {
        key: String,
        value_start: usize,
        value_end: usize,
    },
    Continuation,
}

#[derive(Debug, Clone)]
struct ConfLine {
    raw: String,
    kind: LineKind,
    /// Index into `ConfDocument::sections` of the section this line belongs to
    section: Option<usize>,
}

/// Parsed configuration file that round-trips byte for byte
#[derive(Debug, Clone, Default)]
pub struct ConfDocument {
    lines: Vec<ConfLine>,
    sections: Vec<String>,
}

fn strip_line_ending(raw: &str) -> &str {
    raw.strip_suffix('\n')
        .map(|s| s.strip_suffix('\r').unwrap_or(s))
        .unwrap_or(raw)
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with(';')
}

impl ConfDocument {
    /// Parse a configuration document
    pub fn parse(text: &str) -> Result<Self, ConfParseError> {
        let mut doc = ConfDocument::default();
        let mut current_section: Option<usize> = None;
        let mut in_entry = false;
        let mut backslash_continues = false;

        for (idx, raw) in text.split_inclusive('\n').enumerate() {
            let line_no = idx + 1;
            let content = strip_line_ending(raw);
            let trimmed = content.trim_start();

            let kind = if backslash_continues {
                LineKind::Continuation
            } else if trimmed.trim_end().is_empty() {
                in_entry = false;
                LineKind::Blank
            } else if is_comment(trimmed) {
                LineKind::Comment
            } else if in_entry && trimmed.len() < content.len() {
                LineKind::Continuation
            } else if let Some(rest) = trimmed.strip_prefix('[') {
                let name = Self::parse_section_header(rest, line_no)?;
                doc.sections.push(name);
                current_section = Some(doc.sections.len() - 1);
                in_entry = false;
                LineKind::Section
            } else {
                in_entry = true;
                Self::parse_entry(content, line_no)?
            };

            backslash_continues = matches!(kind, LineKind::Entry { .. } | LineKind::Continuation)
                && content.trim_end().ends_with('\\');

            doc.lines.push(ConfLine {
                raw: raw.to_string(),
                kind,
                section: current_section,
            });
        }

        Ok(doc)
    }

    fn parse_section_header(rest: &str, line: usize) -> Result<String, ConfParseError> {
        let Some(end) = rest.find(']') else {
            return Err(ConfParseError {
                line,
                reason: "unterminated section header".to_string(),
            });
        };

        let trailing = rest[end + 1..].trim();
        if !trailing.is_empty() && !is_comment(trailing) {
            return Err(ConfParseError {
                line,
                reason: format!("unexpected text after section header: '{trailing}'"),
            });
        }

        let name = rest[..end].trim();
        if name.is_empty() {
            return Err(ConfParseError {
                line,
                reason: "empty section name".to_string(),
            });
        }
        Ok(name.to_string())
    }

    fn parse_entry(content: &str, line: usize) -> Result<LineKind, ConfParseError> {
        let Some(delim) = content.find('=') else {
            return Err(ConfParseError {
                line,
                reason: format!("expected 'key = value', found '{}'", content.trim()),
            });
        };

        let key = content[..delim].trim();
        if key.is_empty() {
            return Err(ConfParseError {
                line,
                reason: "entry has an empty key".to_string(),
            });
        }

        let after = &content[delim + 1..];
        let value_start = delim + 1 + (after.len() - after.trim_start().len());
        let value_end = content.trim_end().len().max(value_start);

        Ok(LineKind::Entry {
            key: key.to_ascii_lowercase(),
            value_start,
            value_end,
        })
    }

    fn find_entry(&self, section: &str, key: &str) -> Option<usize> {
        let key = key.to_ascii_lowercase();
        self.lines.iter().rposition(|line| match &line.kind {
            LineKind::Entry { key: k, .. } => {
                *k == key
                    && line
                        .section
                        .is_some_and(|s| self.sections[s] == section)
            }
            _ => false,
        })
    }

    /// Raw value of `key` in `section`; the last occurrence wins
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let idx = self.find_entry(section, key)?;
        match &self.lines[idx].kind {
            LineKind::Entry {
                value_start,
                value_end,
                ..
            } => Some(&self.lines[idx].raw[*value_start..*value_end]),
            _ => None,
        }
    }

    /// Replace the value of an existing entry, leaving the rest of the line intact
    ///
    /// Returns `false` when the section/key pair does not exist; entries are
    /// never created.
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> bool {
        let Some(idx) = self.find_entry(section, key) else {
            return false;
        };

        let line = &mut self.lines[idx];
        if let LineKind::Entry {
            value_start,
            value_end,
            ..
        } = &mut line.kind
        {
            line.raw.replace_range(*value_start..*value_end, value);
            *value_end = *value_start + value.len();
            true
        } else {
            false
        }
    }

    /// Render the document back to text
    pub fn render(&self) -> String {
        self.lines.iter().map(|l| l.raw.as_str()).collect()
    }
}
