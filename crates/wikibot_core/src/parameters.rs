use serde::Serialize;
use tracing::debug;

use crate::braces::{BraceMatch, SkipKind, SkipMap, find_top_level, match_parameter, run_length};
use crate::tags::TagSpan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSpan {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub nest_level: usize,
}

impl ParameterSpan {
    fn inner(&self) -> &str {
        &self.text[3..self.text.len() - 3]
    }

    /// Placeholder name, trimmed.
    pub fn name(&self) -> &str {
        let inner = self.inner();
        match find_top_level(inner, b'|') {
            Some(split) => inner[..split].trim(),
            None => inner.trim(),
        }
    }

    /// Text after the first top-level `|`, if any.
    pub fn default_value(&self) -> Option<&str> {
        let inner = self.inner();
        find_top_level(inner, b'|').map(|split| &inner[split + 1..])
    }
}

/// Every balanced `{{{...}}}` placeholder in `text`, outer before inner.
/// Placeholders inside comments or literal tags are not reported, and
/// placeholders whose braces cannot be balanced are dropped.
pub fn scan_parameters(text: &str, tags: &[TagSpan]) -> Vec<ParameterSpan> {
    let skips = SkipMap::from_tags(tags);
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    // (next index, end, nest level); the innermost open range runs first.
    let mut stack = vec![(0usize, text.len(), 0usize)];

    while let Some((index, to, nest_level)) = stack.last().copied() {
        if index + 3 > to {
            stack.pop();
            continue;
        }
        let mut advance = |next: usize| {
            if let Some(range) = stack.last_mut() {
                range.0 = next;
            }
        };
        if let Some((end, SkipKind::Literal)) = skips.at(index) {
            advance(end);
            continue;
        }
        if bytes[index] != b'{' {
            advance(index + 1);
            continue;
        }
        let run = run_length(&bytes[..to], index, b'{');
        if run < 3 {
            advance(index + run);
            continue;
        }
        // `{{{{x}}}}` and `{{{{{x}}}}}` wrap a placeholder in stray or
        // template braces, so the placeholder starts at the last three.
        let start = match run {
            4 | 5 => index + run - 3,
            _ => index,
        };
        match match_parameter(text, start, to, &skips) {
            BraceMatch::Balanced(end) => {
                advance(end);
                spans.push(ParameterSpan {
                    text: text[start..end].to_string(),
                    start,
                    end,
                    nest_level,
                });
                stack.push((start + 3, end - 3, nest_level + 1));
            }
            BraceMatch::Unbalanced { left, right } => {
                debug!(start, left, right, "dropping unbalanced parameter placeholder");
                advance(start + 1);
            }
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::scan_tags;

    fn scan(text: &str) -> Vec<ParameterSpan> {
        scan_parameters(text, &scan_tags(text))
    }

    #[test]
    fn repairs_nested_triple_braces_into_one_outer_span() {
        let text = "{{{1|{{{page|{{PAGENAME}}}}}}}}";
        let spans = scan(text);
        let outer: Vec<&ParameterSpan> = spans.iter().filter(|s| s.nest_level == 0).collect();
        assert_eq!(outer.len(), 1);
        assert_eq!(outer[0].start, 0);
        assert_eq!(outer[0].end, text.len());
        assert_eq!(outer[0].name(), "1");
        assert_eq!(outer[0].default_value(), Some("{{{page|{{PAGENAME}}}}}"));

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].text, "{{{page|{{PAGENAME}}}}}");
        assert_eq!(spans[1].nest_level, 1);
        assert_eq!(spans[1].start, 5);
    }

    #[test]
    fn finds_sequential_placeholders() {
        let spans = scan("a {{{x}}} b {{{ y |def}}} c");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name(), "x");
        assert_eq!(spans[0].default_value(), None);
        assert_eq!(spans[1].name(), "y");
        assert_eq!(spans[1].default_value(), Some("def"));
        assert!(spans.iter().all(|span| span.nest_level == 0));
    }

    #[test]
    fn template_wrapped_placeholder_is_found() {
        let text = "{{{{{1}}}}}";
        let spans = scan(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "{{{1}}}");
        assert_eq!(spans[0].start, 2);
    }

    #[test]
    fn unbalanced_placeholders_are_dropped() {
        assert!(scan("{{{1|{{{2}}}").iter().all(|span| span.text == "{{{2}}}"));
        assert!(scan("{{{never closed").is_empty());
    }

    #[test]
    fn placeholders_in_literals_are_ignored() {
        let spans = scan("<nowiki>{{{a}}}</nowiki><!-- {{{b}}} -->{{{c}}}");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name(), "c");
    }

    #[test]
    fn deep_nesting_does_not_exhaust_the_stack() {
        let depth = 2000;
        let text = format!("{}x{}", "{{{a|".repeat(depth), "}}}".repeat(depth));
        let spans = scan(&text);
        assert_eq!(spans.len(), depth);
        assert_eq!(spans[0].end, text.len());
        assert_eq!(spans[depth - 1].text, "{{{a|x}}}");
        assert_eq!(spans[depth - 1].nest_level, depth - 1);
    }

    #[test]
    fn plain_templates_are_not_placeholders() {
        assert!(scan("{{a|{{b}}}}").is_empty());
    }
}
