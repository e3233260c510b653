//! Parser for semi-structured kernel response messages.
//!
//! Process responses embed navigation as an inline SmartClient directive,
//! `openDirectTab(<tabId>, <recordId>, ...)`, usually wrapped in an anchor
//! element, plus simple markup tags. The parser pulls out the tab/record
//! reference and reduces the rest to plain text.
//!
//! This is deliberately best-effort substring parsing, not a grammar:
//! malformed or nested directives yield `None` link fields, never errors.

const DIRECTIVE_MARKER: &str = "openDirectTab(";

/// A parsed kernel message: clean text plus an optional navigation target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedMessage {
    pub text: String,
    pub tab_id: Option<String>,
    pub record_id: Option<String>,
}

/// Parse a kernel message string.
///
/// Steps, in order:
/// 1. Locate `openDirectTab(` by substring search; split its argument list on
///    commas and strip quote/space characters to obtain `tabId`/`recordId`.
///    The directive call is excised from the text.
/// 2. Excise the first anchor element and its contents (decorative once the
///    directive has been extracted).
/// 3. Strip all remaining angle-bracket tags character-by-character, with no
///    tag validation and no entity decoding.
///
/// Text with no directive is trimmed; when a directive was extracted the
/// surrounding spacing is left as found.
pub fn parse_kernel_message(message: &str) -> ParsedMessage {
    let mut text = message.to_string();
    let mut tab_id = None;
    let mut record_id = None;

    if let Some((args, rest)) = extract_directive(&text) {
        let mut tokens = args.split(',').map(clean_argument);
        tab_id = tokens.next().filter(|s| !s.is_empty());
        record_id = tokens.next().filter(|s| !s.is_empty());
        text = rest;
    }

    text = excise_anchor(&text);

    let stripped = strip_tags(&text);
    let text = if tab_id.is_none() && record_id.is_none() {
        stripped.trim().to_string()
    } else {
        stripped
    };

    ParsedMessage {
        text,
        tab_id,
        record_id,
    }
}

/// Find the directive, returning its raw argument list and the message with
/// the directive call removed. `None` when the marker or its closing paren is
/// absent.
fn extract_directive(text: &str) -> Option<(String, String)> {
    let start = text.find(DIRECTIVE_MARKER)?;
    let args_start = start + DIRECTIVE_MARKER.len();
    let close = text[args_start..].find(')')?;
    let args = text[args_start..args_start + close].to_string();
    let mut rest = String::with_capacity(text.len());
    rest.push_str(&text[..start]);
    rest.push_str(&text[args_start + close + 1..]);
    Some((args, rest))
}

/// Strip quote and space characters from a directive argument token.
fn clean_argument(token: &str) -> String {
    token
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | ' '))
        .collect()
}

/// Remove the first `<a ...>...</a>` element including its contents.
fn excise_anchor(text: &str) -> String {
    let Some(start) = text.find("<a") else {
        return text.to_string();
    };
    let Some(end) = text[start..].find("</a>") else {
        return text.to_string();
    };
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..start]);
    out.push_str(&text[start + end + "</a>".len()..]);
    out
}

/// Remove every `<...>` run character-by-character.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}
