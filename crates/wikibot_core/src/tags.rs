use serde::Serialize;

/// Name under which `<!-- ... -->` comments are reported.
pub const COMMENT_TAG: &str = "!--";

/// Extension tags whose body is never interpreted as markup.
pub const LITERAL_TAGS: &[&str] = &[
    "nowiki",
    "pre",
    "syntaxhighlight",
    "source",
    "math",
    "chem",
    "ce",
    "score",
    "templatedata",
    "graph",
    "timeline",
    "hiero",
];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSpan {
    /// Lower-cased tag name, or `!--` for comments.
    pub name: String,
    pub text: String,
    pub inner: String,
    pub self_closed: bool,
    pub unclosed: bool,
    pub start: usize,
    pub end: usize,
    pub inner_start: usize,
    pub inner_end: usize,
    pub nest_level: usize,
}

impl TagSpan {
    pub fn is_comment(&self) -> bool {
        self.name == COMMENT_TAG
    }

    /// Comments and literal extension tags: nothing inside them is markup.
    pub fn is_opaque(&self) -> bool {
        is_opaque_name(&self.name)
    }

    pub fn start_tag(&self) -> &str {
        &self.text[..self.inner_start - self.start]
    }

    pub fn end_tag(&self) -> &str {
        &self.text[self.inner_end - self.start..]
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }

    /// True when `index` falls inside the span without sitting on its first byte.
    pub fn strictly_contains(&self, index: usize) -> bool {
        self.start < index && index < self.end
    }
}

fn is_opaque_name(name: &str) -> bool {
    name == COMMENT_TAG || LITERAL_TAGS.contains(&name)
}

#[derive(Debug)]
struct OpenTag {
    name: String,
    start: usize,
    inner_start: usize,
    nest_level: usize,
}

/// Scan `text` for comments and HTML-like tags, pairing start and end tags
/// through a stack. Mismatched end tags close every frame above the match
/// as unclosed, and frames still open at the end run to the end of input.
/// Spans come back outer-before-inner: by start, then by descending end.
pub fn scan_tags(text: &str) -> Vec<TagSpan> {
    let bytes = text.as_bytes();
    let mut stack: Vec<OpenTag> = Vec::new();
    let mut spans = Vec::new();
    let mut index = 0usize;

    while index < bytes.len() {
        if let Some(top) = stack.last()
            && is_opaque_name(&top.name)
        {
            let close = if top.name == COMMENT_TAG {
                find_from(text, "-->", index).map(|at| (at, at + 3))
            } else {
                find_end_tag(text, &top.name, index)
            };
            match close {
                Some((at, after)) => {
                    if let Some(open) = stack.pop() {
                        spans.push(close_span(text, open, at, after, false));
                    }
                    index = after;
                }
                None => index = bytes.len(),
            }
            continue;
        }

        let Some(lt) = text[index..].find('<') else {
            break;
        };
        let at = index + lt;

        if text[at..].starts_with("<!--") {
            stack.push(OpenTag {
                name: COMMENT_TAG.to_string(),
                start: at,
                inner_start: at + 4,
                nest_level: stack.len(),
            });
            index = at + 4;
            continue;
        }

        if let Some((name, after)) = parse_end_tag(text, at) {
            if let Some(position) = stack.iter().rposition(|open| open.name == name) {
                while stack.len() > position + 1 {
                    if let Some(open) = stack.pop() {
                        spans.push(close_span(text, open, at, at, true));
                    }
                }
                if let Some(open) = stack.pop() {
                    spans.push(close_span(text, open, at, after, false));
                }
            }
            index = after;
            continue;
        }

        if let Some((name, after, self_closing)) = parse_start_tag(text, at) {
            if self_closing || VOID_TAGS.contains(&name.as_str()) {
                spans.push(TagSpan {
                    name,
                    text: text[at..after].to_string(),
                    inner: String::new(),
                    self_closed: true,
                    unclosed: false,
                    start: at,
                    end: after,
                    inner_start: after,
                    inner_end: after,
                    nest_level: stack.len(),
                });
            } else {
                stack.push(OpenTag {
                    name,
                    start: at,
                    inner_start: after,
                    nest_level: stack.len(),
                });
            }
            index = after;
            continue;
        }

        index = at + 1;
    }

    while let Some(open) = stack.pop() {
        spans.push(close_span(text, open, text.len(), text.len(), true));
    }

    spans.sort_by(|left, right| {
        left.start
            .cmp(&right.start)
            .then_with(|| right.end.cmp(&left.end))
    });
    spans
}

fn close_span(text: &str, open: OpenTag, inner_end: usize, end: usize, unclosed: bool) -> TagSpan {
    let inner_start = open.inner_start.min(inner_end);
    TagSpan {
        name: open.name,
        text: text[open.start..end].to_string(),
        inner: text[inner_start..inner_end].to_string(),
        self_closed: false,
        unclosed,
        start: open.start,
        end,
        inner_start,
        inner_end,
        nest_level: open.nest_level,
    }
}

fn find_from(text: &str, needle: &str, from: usize) -> Option<usize> {
    text.get(from..)?.find(needle).map(|offset| from + offset)
}

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn read_name(bytes: &[u8], from: usize) -> usize {
    let mut index = from;
    while index < bytes.len() && is_name_byte(bytes[index]) {
        index += 1;
    }
    index
}

/// `</name>` at `at`, tolerating whitespace before `>`.
fn parse_end_tag(text: &str, at: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    if !text[at..].starts_with("</") || !bytes.get(at + 2)?.is_ascii_alphabetic() {
        return None;
    }
    let name_end = read_name(bytes, at + 2);
    let mut index = name_end;
    while index < bytes.len() && bytes[index].is_ascii_whitespace() {
        index += 1;
    }
    if bytes.get(index).copied() != Some(b'>') {
        return None;
    }
    Some((text[at + 2..name_end].to_ascii_lowercase(), index + 1))
}

/// `<name attrs>` or `<name attrs/>` at `at`.
fn parse_start_tag(text: &str, at: usize) -> Option<(String, usize, bool)> {
    let bytes = text.as_bytes();
    if !bytes.get(at + 1)?.is_ascii_alphabetic() {
        return None;
    }
    let name_end = read_name(bytes, at + 1);
    match bytes.get(name_end).copied() {
        Some(b'>') | Some(b'/') => {}
        Some(byte) if byte.is_ascii_whitespace() => {}
        _ => return None,
    }
    let close = find_tag_end(bytes, name_end)?;
    let self_closing = close > at && bytes[close - 1] == b'/';
    Some((
        text[at + 1..name_end].to_ascii_lowercase(),
        close + 1,
        self_closing,
    ))
}

/// Index of the `>` ending a start tag, skipping quoted attribute values.
/// A bare `<` before the end means this was not a tag.
fn find_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut index = start;
    let mut quote = None::<u8>;
    while index < bytes.len() {
        let byte = bytes[index];
        if let Some(active) = quote {
            if byte == active || byte == b'\n' {
                quote = None;
            }
            index += 1;
            continue;
        }
        match byte {
            b'"' | b'\'' => quote = Some(byte),
            b'>' => return Some(index),
            b'<' => return None,
            _ => {}
        }
        index += 1;
    }
    None
}

/// `</name>` (case-insensitive) at or after `from`.
fn find_end_tag(text: &str, name: &str, from: usize) -> Option<(usize, usize)> {
    let mut index = from;
    while let Some(at) = find_from(text, "</", index) {
        if let Some((found, after)) = parse_end_tag(text, at)
            && found == name
        {
            return Some((at, after));
        }
        index = at + 2;
    }
    None
}
