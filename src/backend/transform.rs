//! Built-in stylesheet transformation.
//!
//! Handles a small LESS subset: `//` line comments, top-level
//! `@variable: value;` definitions and their uses inside declaration values,
//! and optional compression. Imports are inlined by the caller before the
//! text reaches [`transform`].

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use std::collections::HashMap;

/// At-rules that are never treated as variable references.
const AT_RULES: &[&str] = &[
    "charset",
    "container",
    "counter-style",
    "document",
    "font-face",
    "font-feature-values",
    "import",
    "keyframes",
    "layer",
    "media",
    "namespace",
    "page",
    "plugin",
    "property",
    "supports",
    "viewport",
];

/// Transform stylesheet `source` into CSS.
///
/// Errors are returned as compiler messages carrying `line N, column M`.
pub fn transform(source: &str, compress: bool) -> Result<String, String> {
    let text = strip_line_comments(source);
    check_braces(&text)?;
    let (body, variables) = extract_variables(&text)?;
    let body = substitute(&body, &variables)?;
    if compress {
        compress_css(&body)
    } else {
        Ok(tidy(&body))
    }
}

fn position(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
    (line, column)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Remove `//` comments outside strings and `url(...)`.
fn strip_line_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;
    let mut in_block = false;
    let mut parens = 0usize;

    while let Some(c) = chars.next() {
        if in_block {
            out.push(c);
            if c == '*' && chars.peek() == Some(&'/') {
                out.push('/');
                chars.next();
                in_block = false;
            }
            continue;
        }
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '(' => {
                parens += 1;
                out.push(c);
            }
            ')' => {
                parens = parens.saturating_sub(1);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                in_block = true;
                out.push(c);
            }
            '/' if parens == 0 && chars.peek() == Some(&'/') => {
                while chars.peek().is_some_and(|&n| n != '\n') {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Scan outside strings and block comments, calling `visit(offset, char)`.
fn scan_code(text: &str, mut visit: impl FnMut(usize, char) -> Result<(), String>) -> Result<(), String> {
    let mut quote: Option<char> = None;
    let mut in_block = false;
    let mut escaped = false;
    let bytes = text.as_bytes();

    for (offset, c) in text.char_indices() {
        if in_block {
            if c == '/' && offset > 0 && bytes[offset - 1] == b'*' {
                in_block = false;
            }
            continue;
        }
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '/' if bytes.get(offset + 1) == Some(&b'*') => in_block = true,
            _ => visit(offset, c)?,
        }
    }
    Ok(())
}

fn check_braces(text: &str) -> Result<(), String> {
    let mut open: Vec<usize> = Vec::new();
    scan_code(text, |offset, c| {
        match c {
            '{' => open.push(offset),
            '}' if open.pop().is_none() => {
                let (line, column) = position(text, offset);
                return Err(format!(
                    "ParseError: unexpected '}}' on line {}, column {}",
                    line, column
                ));
            }
            _ => {}
        }
        Ok(())
    })?;
    match open.last() {
        Some(&offset) => {
            let (line, column) = position(text, offset);
            Err(format!("ParseError: missing closing '}}' for block on line {}, column {}", line, column))
        }
        None => Ok(()),
    }
}

/// Pull out top-level `@name: value;` definitions.
///
/// Each definition is replaced by the newlines it spanned so that later
/// error positions keep their line numbers.
fn extract_variables(text: &str) -> Result<(String, HashMap<String, String>), String> {
    let mut variables: HashMap<String, String> = HashMap::new();
    let mut body = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut cursor = 0usize;
    let mut definitions: Vec<(usize, usize, String, usize)> = Vec::new();
    let mut statement_start = true;

    scan_code(text, |offset, c| {
        match c {
            '{' => {
                depth += 1;
                statement_start = true;
            }
            '}' => {
                depth = depth.saturating_sub(1);
                statement_start = true;
            }
            ';' => statement_start = true,
            '@' if depth == 0 && statement_start => {
                if let Some((end, name, value_start)) = parse_definition(text, offset) {
                    definitions.push((offset, end, name, value_start));
                }
                statement_start = false;
            }
            c if c.is_whitespace() => {}
            _ => statement_start = false,
        }
        Ok(())
    })?;

    for (start, end, name, value_start) in definitions {
        if start < cursor {
            continue;
        }
        let raw = text[value_start..end - 1].trim();
        let value = substitute_at(text, value_start, raw, &variables)?;
        body.push_str(&text[cursor..start]);
        body.extend(text[start..end].chars().filter(|&c| c == '\n'));
        variables.insert(name, value.trim().to_string());
        cursor = end;
    }
    body.push_str(&text[cursor..]);
    Ok((body, variables))
}

/// Parse `@name: value;` at `start`. Returns (end, name, value_start).
fn parse_definition(text: &str, start: usize) -> Option<(usize, String, usize)> {
    let rest = &text[start + 1..];
    let name_len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    let name = &rest[..name_len];
    let after = &rest[name_len..];
    let colon = after.len() - after.trim_start().len();
    if !after[colon..].starts_with(':') {
        return None;
    }
    let value_start = start + 1 + name_len + colon + 1;
    let semicolon = text[value_start..].find([';', '{', '}'])?;
    if text.as_bytes()[value_start + semicolon] != b';' {
        return None;
    }
    Some((value_start + semicolon + 1, name.to_string(), value_start))
}

/// Substitute variables in a definition value found at `base` in `text`.
fn substitute_at(
    text: &str,
    base: usize,
    value: &str,
    variables: &HashMap<String, String>,
) -> Result<String, String> {
    let leading = text[base..].len() - text[base..].trim_start().len();
    replace_references(value, variables).map_err(|(offset, name)| {
        let (line, column) = position(text, base + leading + offset);
        undefined(&name, line, column)
    })
}

fn undefined(name: &str, line: usize, column: usize) -> String {
    format!("NameError: variable @{} is undefined on line {}, column {}", name, line, column)
}

/// Replace `@name` references in declaration values of `body`.
fn substitute(body: &str, variables: &HashMap<String, String>) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut last = 0usize;
    let mut in_value = false;
    let mut depth = 0usize;
    let mut pending: Vec<(usize, usize, String)> = Vec::new();

    scan_code(body, |offset, c| {
        match c {
            '{' => {
                depth += 1;
                in_value = false;
            }
            '}' => {
                depth = depth.saturating_sub(1);
                in_value = false;
            }
            ';' => in_value = false,
            ':' if depth > 0 => in_value = true,
            '@' => {
                let rest = &body[offset + 1..];
                let len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
                let name = &rest[..len];
                if len == 0 || AT_RULES.contains(&name) {
                    return Ok(());
                }
                match variables.get(name) {
                    Some(value) => pending.push((offset, offset + 1 + len, value.clone())),
                    None if in_value => {
                        let (line, column) = position(body, offset);
                        return Err(undefined(name, line, column));
                    }
                    None => {}
                }
            }
            _ => {}
        }
        Ok(())
    })?;

    for (start, end, value) in pending {
        out.push_str(&body[last..start]);
        out.push_str(&value);
        last = end;
    }
    out.push_str(&body[last..]);
    Ok(out)
}

/// Replace every `@name` in `value`, reporting the first undefined one.
fn replace_references(
    value: &str,
    variables: &HashMap<String, String>,
) -> Result<String, (usize, String)> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut consumed = 0usize;
    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        let len = tail.find(|c: char| !is_ident_char(c)).unwrap_or(tail.len());
        let name = &tail[..len];
        match variables.get(name) {
            Some(v) => out.push_str(v),
            None if len > 0 => return Err((consumed + at, name.to_string())),
            None => out.push('@'),
        }
        consumed += at + 1 + len;
        rest = &tail[len..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Drop whitespace-only lines and trailing spaces.
fn tidy(body: &str) -> String {
    let lines: Vec<&str> =
        body.lines().map(str::trim_end).filter(|line| !line.is_empty()).collect();
    if lines.is_empty() {
        String::new()
    } else {
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// Print `body` as minified CSS.
fn compress_css(body: &str) -> Result<String, String> {
    let sheet = StyleSheet::parse(body, ParserOptions::default()).map_err(|e| match &e.loc {
        Some(loc) => {
            format!("ParseError: {} on line {}, column {}", e.kind, loc.line + 1, loc.column)
        }
        None => format!("ParseError: {}", e.kind),
    })?;
    let printed = sheet
        .to_css(PrinterOptions { minify: true, ..PrinterOptions::default() })
        .map_err(|e| format!("PrintError: {}", e))?;
    Ok(printed.code)
}
