use std::sync::OnceLock;

use crate::parameters::{ParameterSpan, scan_parameters};
use crate::sections::{Section, segment_sections};
use crate::tags::{TagSpan, scan_tags};
use crate::template::ParsedTemplate;
use crate::template_scan::{ScanOptions, scan_templates};

/// Page text plus lazily computed tag, section and parameter scans.
///
/// Each scan runs at most once per instance. Templates are scanned on every
/// call because callers own and mutate the returned models.
#[derive(Debug, Default)]
pub struct Wikitext {
    content: String,
    tags: OnceLock<Vec<TagSpan>>,
    sections: OnceLock<Vec<Section>>,
    parameters: OnceLock<Vec<ParameterSpan>>,
}

impl Wikitext {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    fn tag_cache(&self) -> &[TagSpan] {
        self.tags.get_or_init(|| scan_tags(&self.content))
    }

    fn parameter_cache(&self) -> &[ParameterSpan] {
        self.parameters
            .get_or_init(|| scan_parameters(&self.content, self.tag_cache()))
    }

    pub fn tags(&self) -> Vec<TagSpan> {
        self.tag_cache().to_vec()
    }

    pub fn tags_where(&self, predicate: impl Fn(&TagSpan) -> bool) -> Vec<TagSpan> {
        self.tag_cache()
            .iter()
            .filter(|tag| predicate(tag))
            .cloned()
            .collect()
    }

    pub fn sections(&self) -> Vec<Section> {
        self.sections
            .get_or_init(|| segment_sections(&self.content, self.tag_cache()))
            .clone()
    }

    /// Placeholders; with `recursive` false only the outermost ones.
    pub fn parameters(&self, recursive: bool) -> Vec<ParameterSpan> {
        self.parameter_cache()
            .iter()
            .filter(|parameter| recursive || parameter.nest_level == 0)
            .cloned()
            .collect()
    }

    pub fn templates(&self, options: &ScanOptions<'_>) -> Vec<ParsedTemplate> {
        scan_templates(
            &self.content,
            self.tag_cache(),
            self.parameter_cache(),
            options,
        )
    }
}
