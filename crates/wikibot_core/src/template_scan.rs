use std::collections::HashSet;

use tracing::debug;

use crate::braces::{SkipKind, SkipMap, wikilink_end};
use crate::parameters::ParameterSpan;
use crate::tags::TagSpan;
use crate::template::{
    Hierarchies, ParsedTemplate, Template, TemplateArgument, TemplateError, clean_name,
};
use crate::title::NamespaceTable;

type NameFilter<'a> = Box<dyn Fn(&str) -> bool + 'a>;
type TemplateFilter<'a> = Box<dyn Fn(&Template) -> bool + 'a>;

/// Which templates a scan reports and how far it descends.
pub struct ScanOptions<'a> {
    name_filter: Option<NameFilter<'a>>,
    template_filter: Option<TemplateFilter<'a>>,
    recursion_filter: Option<TemplateFilter<'a>>,
    recursive: bool,
    hierarchies: Option<&'a Hierarchies>,
    namespaces: &'a NamespaceTable,
}

impl Default for ScanOptions<'_> {
    fn default() -> Self {
        Self {
            name_filter: None,
            template_filter: None,
            recursion_filter: None,
            recursive: true,
            hierarchies: None,
            namespaces: NamespaceTable::standard(),
        }
    }
}

impl<'a> ScanOptions<'a> {
    /// Report only templates whose canonical name is one of `names`.
    /// Names are canonicalized against the namespaces set so far.
    pub fn with_names<S: AsRef<str>>(self, names: &[S]) -> Self {
        let wanted: HashSet<String> = names
            .iter()
            .map(|name| {
                clean_name(name.as_ref(), self.namespaces)
                    .unwrap_or_else(|_| name.as_ref().trim().to_string())
            })
            .collect();
        self.with_name_filter(move |name| wanted.contains(name))
    }

    pub fn with_name_filter(mut self, filter: impl Fn(&str) -> bool + 'a) -> Self {
        self.name_filter = Some(Box::new(filter));
        self
    }

    pub fn with_template_filter(mut self, filter: impl Fn(&Template) -> bool + 'a) -> Self {
        self.template_filter = Some(Box::new(filter));
        self
    }

    /// Decide per template whether its interior is scanned, whether or
    /// not the template itself is reported.
    pub fn with_recursion_filter(mut self, filter: impl Fn(&Template) -> bool + 'a) -> Self {
        self.recursion_filter = Some(Box::new(filter));
        self
    }

    pub fn with_hierarchies(mut self, hierarchies: &'a Hierarchies) -> Self {
        self.hierarchies = Some(hierarchies);
        self
    }

    pub fn with_namespaces(mut self, namespaces: &'a NamespaceTable) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Never look inside templates.
    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    fn reports(&self, template: &Template) -> bool {
        self.name_filter
            .as_ref()
            .is_none_or(|filter| filter(template.clean_name()))
            && self
                .template_filter
                .as_ref()
                .is_none_or(|filter| filter(template))
    }

    fn descends(&self, template: Option<&Template>) -> bool {
        if !self.recursive {
            return false;
        }
        match (template, &self.recursion_filter) {
            (Some(template), Some(filter)) => filter(template),
            _ => true,
        }
    }
}

/// A `|`-separated slot inside a template, in absolute byte offsets.
#[derive(Debug, Clone, Copy)]
struct Slot {
    start: usize,
    end: usize,
    equals: Option<usize>,
}

struct Scanner<'s, 'o> {
    text: &'s str,
    skips: SkipMap,
    options: &'s ScanOptions<'o>,
}

/// Find templates in `text`, outer templates before the ones nested in them.
///
/// `tags` and `parameters` must come from the same text; comments, literal
/// tags and placeholders are read as single units so their braces and pipes
/// never count as template syntax. Templates inside placeholder defaults are
/// still found.
pub fn scan_templates(
    text: &str,
    tags: &[TagSpan],
    parameters: &[ParameterSpan],
    options: &ScanOptions<'_>,
) -> Vec<ParsedTemplate> {
    let mut skips = SkipMap::from_tags(tags);
    for parameter in parameters {
        skips.insert(parameter.start, parameter.end, SkipKind::Parameter);
    }
    let scanner = Scanner {
        text,
        skips,
        options,
    };
    scanner.scan()
}

/// A stretch of text still to be scanned at one nesting level.
#[derive(Debug, Clone, Copy)]
struct Range {
    index: usize,
    to: usize,
    nest_level: usize,
}

impl Scanner<'_, '_> {
    /// Walk nested ranges depth first on an explicit stack. The innermost
    /// open range is scanned first, so outer templates precede their
    /// nested ones.
    fn scan(&self) -> Vec<ParsedTemplate> {
        let bytes = self.text.as_bytes();
        let mut found = Vec::new();
        let mut stack = vec![Range {
            index: 0,
            to: self.text.len(),
            nest_level: 0,
        }];

        while let Some(range) = stack.last_mut() {
            let Range {
                index,
                to,
                nest_level,
            } = *range;
            if index + 1 >= to {
                stack.pop();
                continue;
            }
            if let Some((end, kind)) = self.skips.at(index)
                && end <= to
            {
                range.index = end;
                if kind == SkipKind::Parameter {
                    stack.push(Range {
                        index: index + 3,
                        to: end - 3,
                        nest_level,
                    });
                }
                continue;
            }
            if bytes[index..to].starts_with(b"[[")
                && let Some(end) = wikilink_end(self.text, index)
                && end <= to
            {
                range.index = end;
                continue;
            }
            if !bytes[index..to].starts_with(b"{{") {
                range.index = index + 1;
                continue;
            }
            let Some((end, slots)) = self.read_template(index, to) else {
                range.index = index + 2;
                continue;
            };
            range.index = end;
            if self.close(index, end, &slots, nest_level, &mut found) {
                stack.push(Range {
                    index: index + 2,
                    to: end - 2,
                    nest_level: nest_level + 1,
                });
            }
        }
        found
    }

    /// Read the template opening at `start` up to its matching `}}`.
    /// Only pipes and equals signs at the template's own depth delimit
    /// slots; skip spans and links are consumed whole.
    fn read_template(&self, start: usize, to: usize) -> Option<(usize, Vec<Slot>)> {
        let bytes = &self.text.as_bytes()[..to];
        let mut depth = 2usize;
        let mut index = start + 2;
        let mut slots = vec![Slot {
            start: index,
            end: index,
            equals: None,
        }];

        while index < to {
            if let Some((end, _)) = self.skips.at(index)
                && end <= to
            {
                index = end;
                continue;
            }
            if bytes[index..].starts_with(b"[[")
                && let Some(end) = wikilink_end(self.text, index)
                && end <= to
            {
                index = end;
                continue;
            }
            if bytes[index..].starts_with(b"{{") {
                depth += 2;
                index += 2;
                continue;
            }
            if bytes[index..].starts_with(b"}}") {
                depth -= 2;
                index += 2;
                if depth == 0 {
                    if let Some(last) = slots.last_mut() {
                        last.end = index - 2;
                    }
                    return Some((index, slots));
                }
                continue;
            }
            if depth == 2 {
                let argument_slot = slots.len() > 1;
                match bytes[index] {
                    b'|' => {
                        if let Some(last) = slots.last_mut() {
                            last.end = index;
                        }
                        slots.push(Slot {
                            start: index + 1,
                            end: index + 1,
                            equals: None,
                        });
                    }
                    b'=' if argument_slot => {
                        if let Some(last) = slots.last_mut()
                            && last.equals.is_none()
                        {
                            last.equals = Some(index);
                        }
                    }
                    _ => {}
                }
            }
            index += 1;
        }
        None
    }

    /// Report the template spanning `start..end` and tell whether its
    /// interior should be scanned.
    fn close(
        &self,
        start: usize,
        end: usize,
        slots: &[Slot],
        nest_level: usize,
        found: &mut Vec<ParsedTemplate>,
    ) -> bool {
        let descend = match self.build(slots) {
            Ok(template) => {
                let descend = self.options.descends(Some(&template));
                if self.options.reports(&template) {
                    found.push(ParsedTemplate::new(
                        template,
                        &self.text[start..end],
                        start,
                        nest_level,
                    ));
                }
                descend
            }
            Err(error) => {
                debug!(start, %error, "skipping template with unusable name");
                self.options.descends(None)
            }
        };
        descend && self.text[start + 2..end - 2].contains("{{")
    }

    fn build(&self, slots: &[Slot]) -> Result<Template, TemplateError> {
        let (name, arguments) = match slots.split_first() {
            Some(split) => split,
            None => return Err(TemplateError::EmptyName),
        };
        let template = Template::new_in(&self.text[name.start..name.end], self.options.namespaces)?;
        let hierarchy = self
            .options
            .hierarchies
            .and_then(|hierarchies| hierarchies.get(template.clean_name()))
            .map(<[_]>::to_vec)
            .unwrap_or_default();
        let mut template = template.with_hierarchy(hierarchy);
        for slot in arguments {
            let raw = &self.text[slot.start..slot.end];
            let equals = slot.equals.map(|at| at - slot.start);
            template.add_argument_with(TemplateArgument::from_raw(raw, equals), true);
        }
        Ok(template)
    }
}
