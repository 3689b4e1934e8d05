use serde::Serialize;

use crate::tags::TagSpan;

const MAX_HEADING_LEVEL: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Heading text with comments, tags, link brackets and bold/italic quotes removed.
    pub title: String,
    /// The heading as written, without the line break.
    pub heading: String,
    pub level: u8,
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub content: String,
}

#[derive(Debug, Clone)]
struct Heading {
    start: usize,
    level: u8,
    heading: String,
    title: String,
}

/// Split `text` into sections. Section 0 is the lead before the first heading;
/// every other section runs to the next heading of the same or a shallower level.
pub fn segment_sections(text: &str, tags: &[TagSpan]) -> Vec<Section> {
    let opaque: Vec<&TagSpan> = tags.iter().filter(|tag| tag.is_opaque()).collect();
    let hidden = |index: usize| opaque.iter().any(|tag| tag.strictly_contains(index));

    let mut headings = Vec::new();
    let mut line_start = 0usize;
    for line in text.split_inclusive('\n') {
        let start = line_start;
        line_start += line.len();
        if !line.starts_with('=') || hidden(start) {
            continue;
        }
        let line_end = start + line.trim_end_matches(['\n', '\r']).len();
        if let Some(heading) = parse_heading_line(text, start, line_end, &opaque) {
            headings.push(heading);
        }
    }

    for tag in tags {
        let Some(level) = html_heading_level(&tag.name) else {
            continue;
        };
        if tag.self_closed || hidden(tag.start) {
            continue;
        }
        headings.push(Heading {
            start: tag.start,
            level,
            heading: tag.text.clone(),
            title: strip_markup(&tag.inner),
        });
    }

    headings.sort_by_key(|heading| heading.start);
    headings.dedup_by_key(|heading| heading.start);

    let mut sections = Vec::with_capacity(headings.len() + 1);
    let lead_end = headings.first().map_or(text.len(), |heading| heading.start);
    sections.push(Section {
        title: String::new(),
        heading: String::new(),
        level: 1,
        index: 0,
        start: 0,
        end: lead_end,
        content: text[..lead_end].to_string(),
    });

    for (position, heading) in headings.iter().enumerate() {
        let end = headings[position + 1..]
            .iter()
            .find(|next| next.level <= heading.level)
            .map_or(text.len(), |next| next.start);
        sections.push(Section {
            title: heading.title.clone(),
            heading: heading.heading.clone(),
            level: heading.level,
            index: position + 1,
            start: heading.start,
            end,
            content: text[heading.start..end].to_string(),
        });
    }
    sections
}

/// `== title ==` between `start` and `line_end`. Trailing whitespace is
/// allowed after the closing run, and so are comments; anything else
/// disqualifies the line.
fn parse_heading_line(
    text: &str,
    start: usize,
    line_end: usize,
    opaque: &[&TagSpan],
) -> Option<Heading> {
    let mut end = start + text[start..line_end].trim_end().len();
    loop {
        let trailing_comment = opaque.iter().find(|tag| {
            tag.is_comment() && tag.start > start && tag.start < end && tag.end >= end
        });
        match trailing_comment {
            Some(tag) => end = start + text[start..tag.start].trim_end().len(),
            None => break,
        }
    }

    let marked = &text[start..end];
    let count = marked.len();
    let left = marked.bytes().take_while(|byte| *byte == b'=').count();
    let right = marked.bytes().rev().take_while(|byte| *byte == b'=').count();
    if right == 0 {
        return None;
    }

    let (level, inner) = if left == count {
        if count < 3 {
            return None;
        }
        let side = ((count - 1) / 2).min(MAX_HEADING_LEVEL);
        (side, &marked[side..count - side])
    } else {
        let level = left.min(right).min(MAX_HEADING_LEVEL);
        (level, &marked[level..count - level])
    };

    Some(Heading {
        start,
        level: u8::try_from(level).ok()?,
        heading: text[start..line_end].to_string(),
        title: strip_markup(inner),
    })
}

fn html_heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn strip_markup(raw: &str) -> String {
    let mut output = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(ch) = rest.chars().next() {
        if rest.starts_with("<!--") {
            match rest.find("-->") {
                Some(end) => {
                    rest = &rest[end + 3..];
                    continue;
                }
                None => break,
            }
        }
        if ch == '<'
            && rest
                .as_bytes()
                .get(1)
                .is_some_and(|next| next.is_ascii_alphabetic() || *next == b'/')
            && let Some(end) = rest.find('>')
        {
            rest = &rest[end + 1..];
            continue;
        }
        if rest.starts_with("[[")
            && let Some(end) = rest.find("]]")
        {
            let link = &rest[2..end];
            output.push_str(link.rsplit_once('|').map_or(link, |(_, label)| label));
            rest = &rest[end + 2..];
            continue;
        }
        output.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    output
        .replace("'''", "")
        .replace("''", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::scan_tags;

    fn segment(text: &str) -> Vec<Section> {
        segment_sections(text, &scan_tags(text))
    }

    #[test]
    fn deeper_headings_nest_inside_shallower_ones() {
        let text = "A\n==B==\ntext\n===C===\nmore\n==D==\nend";
        let sections = segment(text);
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["", "B", "C", "D"]);

        assert_eq!(sections[0].content, "A\n");
        assert_eq!(sections[0].level, 1);
        assert_eq!(sections[1].content, "==B==\ntext\n===C===\nmore\n");
        assert_eq!(sections[1].level, 2);
        assert_eq!(sections[2].content, "===C===\nmore\n");
        assert_eq!(sections[2].level, 3);
        assert_eq!(sections[3].content, "==D==\nend");
        assert_eq!(sections[3].end, text.len());
        assert_eq!(
            sections.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn text_without_headings_is_one_section() {
        let sections = segment("just text\nmore");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].end, 14);
        assert!(sections[0].heading.is_empty());
    }

    #[test]
    fn uneven_markers_use_the_smaller_run() {
        let sections = segment("===Title==\n");
        assert_eq!(sections[1].level, 2);
        assert_eq!(sections[1].title, "=Title");
        assert_eq!(sections[1].heading, "===Title==");
    }

    #[test]
    fn trailing_text_disqualifies_but_comments_do_not() {
        let sections = segment("==A== junk\n==B== <!-- note -->  \n");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].title, "B");
    }

    #[test]
    fn headings_inside_comments_and_literals_are_ignored() {
        let text = "<!--\n==Hidden==\n-->\n<pre>\n==Pre==\n</pre>\n==Shown==\n";
        let sections = segment(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].title, "Shown");
    }

    #[test]
    fn html_headings_count_and_markup_is_stripped() {
        let text = "lead\n<h3>Some [[Link|label]]</h3>\nbody\n== '''Bold''' <span>x</span> ==\n";
        let sections = segment(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1].level, 3);
        assert_eq!(sections[1].title, "Some label");
        assert_eq!(sections[2].title, "Bold x");
        assert_eq!(sections[1].end, sections[2].start);
    }

    #[test]
    fn bare_marker_lines_need_three_equals() {
        let sections = segment("==\n=====\n");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].level, 2);
        assert_eq!(sections[1].title, "=");
    }
}
