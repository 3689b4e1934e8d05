//! Brace counting and skip-span bookkeeping shared by the parameter and
//! template scanners.

use std::collections::HashMap;

use crate::tags::TagSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    /// A comment or literal extension tag.
    Literal,
    /// A `{{{...}}}` placeholder.
    Parameter,
}

/// Byte ranges consumed as a single unit by the scanners, keyed by start.
#[derive(Debug, Default, Clone)]
pub struct SkipMap {
    by_start: HashMap<usize, (usize, SkipKind)>,
}

impl SkipMap {
    pub fn from_tags(tags: &[TagSpan]) -> Self {
        let mut map = Self::default();
        for tag in tags.iter().filter(|tag| tag.is_opaque()) {
            map.insert(tag.start, tag.end, SkipKind::Literal);
        }
        map
    }

    /// Register a range; when two share a start the longer one is kept.
    pub fn insert(&mut self, start: usize, end: usize, kind: SkipKind) {
        let entry = self.by_start.entry(start).or_insert((end, kind));
        if end > entry.0 {
            *entry = (end, kind);
        }
    }

    pub fn at(&self, index: usize) -> Option<(usize, SkipKind)> {
        self.by_start.get(&index).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BraceMatch {
    /// Exclusive end of a placeholder whose braces balance.
    Balanced(usize),
    Unbalanced { left: usize, right: usize },
}

/// Find the end of the `{{{` placeholder opening at `start`, looking no
/// further than `limit`.
///
/// The minimal candidate runs to the first `}}}`. When it opened more
/// braces than it closed, the scan keeps consuming closing braces one at a
/// time until the counts meet; if they never do, or the candidate closed
/// more than it opened, the placeholder is reported unbalanced.
pub fn match_parameter(text: &str, start: usize, limit: usize, skips: &SkipMap) -> BraceMatch {
    let bytes = &text.as_bytes()[..limit.min(text.len())];
    let mut left = 0usize;
    let mut right = 0usize;
    let mut index = start;
    let mut minimal_end = None;

    while index < bytes.len() {
        if index > start
            && let Some((end, SkipKind::Literal)) = skips.at(index)
        {
            index = end.min(bytes.len());
            continue;
        }
        match bytes[index] {
            b'{' => left += 1,
            b'}' if index > start + 2 && bytes[index..].starts_with(b"}}}") => {
                right += 3;
                minimal_end = Some(index + 3);
                break;
            }
            b'}' => right += 1,
            _ => {}
        }
        index += 1;
    }

    let Some(mut index) = minimal_end else {
        return BraceMatch::Unbalanced { left, right };
    };
    if right > left {
        return BraceMatch::Unbalanced { left, right };
    }

    while right < left && index < bytes.len() {
        if let Some((end, SkipKind::Literal)) = skips.at(index) {
            index = end.min(bytes.len());
            continue;
        }
        match bytes[index] {
            b'{' => left += 1,
            b'}' => right += 1,
            _ => {}
        }
        index += 1;
    }

    if left == right {
        BraceMatch::Balanced(index)
    } else {
        BraceMatch::Unbalanced { left, right }
    }
}

/// Length of the run of `byte` starting at `index`.
pub fn run_length(bytes: &[u8], index: usize, byte: u8) -> usize {
    bytes[index..].iter().take_while(|b| **b == byte).count()
}

/// End of a `[[...]]` link opening at `at`. The link may not contain
/// another `[`, so `[[a|[[b]]]]` only matches the inner link.
pub fn wikilink_end(text: &str, at: usize) -> Option<usize> {
    let rest = text.get(at + 2..)?;
    let close = rest.find("]]")?;
    if rest[..close].contains('[') {
        return None;
    }
    Some(at + 2 + close + 2)
}

/// Index of the first `needle` byte not nested inside `{{ }}` or `[[ ]]`.
pub fn find_top_level(text: &str, needle: u8) -> Option<usize> {
    find_top_level_skipping(text, needle, &SkipMap::default())
}

/// Like [`find_top_level`], stepping over every range in `skips`.
pub fn find_top_level_skipping(text: &str, needle: u8, skips: &SkipMap) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut braces = 0usize;
    let mut brackets = 0usize;
    let mut index = 0usize;
    while index < bytes.len() {
        if let Some((end, _)) = skips.at(index) {
            index = end.max(index + 1);
            continue;
        }
        match bytes[index] {
            b'{' => braces += 1,
            b'}' => braces = braces.saturating_sub(1),
            b'[' => brackets += 1,
            b']' => brackets = brackets.saturating_sub(1),
            byte if byte == needle && braces == 0 && brackets == 0 => return Some(index),
            _ => {}
        }
        index += 1;
    }
    None
}
