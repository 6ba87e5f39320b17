//! Content line lexer for iCalendar (RFC 5545 §3.1).
//!
//! Handles line unfolding and tokenization of content lines.

use crate::error::{RfcError, RfcResult};

/// A single unfolded content line: `name *(";" param) ":" value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    /// Property name, uppercased.
    pub name: String,
    /// Parameters in source order, names uppercased.
    pub params: Vec<(String, String)>,
    /// Raw value text after the first unquoted colon.
    pub value: String,
    /// 1-based line number of the first physical line.
    pub line: usize,
}

impl ContentLine {
    /// Returns the first value of the named parameter, if present.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Renders the line back with an uppercased name, quoting parameter
    /// values that contain delimiters.
    #[must_use]
    pub fn to_canonical(&self) -> String {
        let mut out = self.name.clone();
        for (key, value) in &self.params {
            out.push(';');
            out.push_str(key);
            out.push('=');
            if value.contains([':', ';', ',']) {
                out.push('"');
                out.push_str(value);
                out.push('"');
            } else {
                out.push_str(value);
            }
        }
        out.push(':');
        out.push_str(&self.value);
        out
    }
}

/// Splits input into content lines, merging folded continuations.
///
/// Handles both CRLF and bare LF line endings. Lines starting with SP/HTAB are
/// treated as continuations of the previous line. Per RFC 5545 §3.1, unfolding
/// removes the line break and the whitespace character (no space is inserted).
#[must_use]
pub fn split_lines(input: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();

    for (i, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if let Some(continuation) = line.strip_prefix([' ', '\t']) {
            if let Some((_, prev)) = lines.last_mut() {
                prev.push_str(continuation);
            } else {
                lines.push((i + 1, continuation.to_string()));
            }
        } else {
            lines.push((i + 1, line.to_string()));
        }
    }

    lines
}

/// Parses a single unfolded content line.
///
/// Parameter values may be quoted; colons and semicolons inside quotes do not
/// terminate the parameter.
///
/// ## Errors
/// Returns `RfcError::ParseError` if the line has no name, contains an invalid
/// name character, or has no value separator.
pub fn parse_content_line(line: &str, line_num: usize) -> RfcResult<ContentLine> {
    let name_end = line
        .find([';', ':'])
        .ok_or_else(|| RfcError::ParseError(format!("line {line_num}: missing ':'")))?;

    let name = &line[..name_end];
    if name.is_empty() {
        return Err(RfcError::ParseError(format!(
            "line {line_num}: missing property name"
        )));
    }
    if let Some(bad) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
        return Err(RfcError::ParseError(format!(
            "line {line_num}: invalid character {bad:?} in property name"
        )));
    }

    let mut params = Vec::new();
    let mut rest = &line[name_end..];

    while let Some(after_semi) = rest.strip_prefix(';') {
        let (param, remainder) = parse_parameter(after_semi, line_num)?;
        params.push(param);
        rest = remainder;
    }

    let value = rest
        .strip_prefix(':')
        .ok_or_else(|| RfcError::ParseError(format!("line {line_num}: missing ':'")))?;

    Ok(ContentLine {
        name: name.to_ascii_uppercase(),
        params,
        value: value.to_string(),
        line: line_num,
    })
}

/// Parses `name=value` up to the next unquoted `;` or `:`.
///
/// Returns the parameter and the unconsumed remainder (starting at the
/// delimiter).
fn parse_parameter(input: &str, line_num: usize) -> RfcResult<((String, String), &str)> {
    let eq = input
        .find(['=', ';', ':'])
        .filter(|&i| input[i..].starts_with('='))
        .ok_or_else(|| RfcError::ParseError(format!("line {line_num}: parameter without '='")))?;
    let name = input[..eq].to_ascii_uppercase();
    if name.is_empty() {
        return Err(RfcError::ParseError(format!(
            "line {line_num}: empty parameter name"
        )));
    }

    let after_eq = &input[eq + 1..];
    let mut in_quotes = false;
    let mut end = after_eq.len();
    for (i, c) in after_eq.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' | ':' if !in_quotes => {
                end = i;
                break;
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err(RfcError::ParseError(format!(
            "line {line_num}: unterminated quoted parameter value"
        )));
    }

    let value = after_eq[..end].trim_matches('"').to_string();
    Ok(((name, value), &after_eq[end..]))
}

/// Unfolds and parses every content line of a document.
///
/// ## Errors
/// Returns the first content line error encountered.
pub fn parse_content_lines(input: &str) -> RfcResult<Vec<ContentLine>> {
    split_lines(input)
        .into_iter()
        .map(|(line_num, line)| parse_content_line(&line, line_num))
        .collect()
}
