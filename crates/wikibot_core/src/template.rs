use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::braces::{SkipMap, find_top_level_skipping};
use crate::tags::scan_tags;
use crate::title::{NS_MAIN, NS_TEMPLATE, NamespaceTable, Title, TitleError};

const SUBST_PREFIX: &str = "subst:";
const SUBST_PREFIXES: &[&str] = &["safesubst:", SUBST_PREFIX];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template name is empty")]
    EmptyName,
    #[error("template name `{0}` spans several lines")]
    MultilineName(String),
    #[error("invalid template name `{name}`")]
    InvalidName {
        name: String,
        #[source]
        source: TitleError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateArgument {
    pub name: String,
    pub value: String,
    /// Name as written, with its padding and comments. Empty for positional arguments.
    pub unformatted_name: String,
    pub unformatted_value: String,
    pub positional: bool,
}

impl TemplateArgument {
    pub fn named(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        Self {
            unformatted_name: name.clone(),
            unformatted_value: value.clone(),
            name,
            value,
            positional: false,
        }
    }

    /// An unnamed argument; it is numbered when added to a template.
    pub fn positional(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: String::new(),
            unformatted_name: String::new(),
            unformatted_value: value.clone(),
            value,
            positional: true,
        }
    }

    /// Build from one `|`-separated slot; `equals` is the offset of the
    /// first top-level `=` when the slot is named.
    pub(crate) fn from_raw(raw: &str, equals: Option<usize>) -> Self {
        match equals {
            Some(split) => {
                let unformatted_name = &raw[..split];
                let unformatted_value = &raw[split + 1..];
                Self {
                    name: strip_comments(unformatted_name).trim().to_string(),
                    value: unformatted_value.trim().to_string(),
                    unformatted_name: unformatted_name.to_string(),
                    unformatted_value: unformatted_value.to_string(),
                    positional: false,
                }
            }
            None => Self::positional(raw),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Positional arguments whose value holds a top-level `=` must be written as `n=value`.
    /// Signs inside comments and literal tags do not count.
    fn renders_bare(&self) -> bool {
        if !self.positional {
            return false;
        }
        if !self.value.contains('=') {
            return true;
        }
        let skips = SkipMap::from_tags(&scan_tags(&self.value));
        find_top_level_skipping(&self.value, b'=', &skips).is_none()
    }
}

/// Argument name aliases, highest priority first.
pub type AliasGroup = Vec<String>;

/// Alias groups per canonical template name.
#[derive(Debug, Clone, Default)]
pub struct Hierarchies {
    by_name: HashMap<String, Vec<AliasGroup>>,
}

impl Hierarchies {
    pub fn insert(&mut self, template: &str, groups: Vec<AliasGroup>) {
        self.insert_in(template, groups, NamespaceTable::standard());
    }

    pub fn insert_in(
        &mut self,
        template: &str,
        groups: Vec<AliasGroup>,
        namespaces: &NamespaceTable,
    ) {
        let key = clean_name(template, namespaces).unwrap_or_else(|_| template.trim().to_string());
        self.by_name.entry(key).or_default().extend(groups);
    }

    pub fn get(&self, clean_name: &str) -> Option<&[AliasGroup]> {
        self.by_name.get(clean_name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Canonical name of a transclusion target: `Foo` for `Template:foo`,
/// `:Foo` for a main-namespace page, `User:Foo` for other namespaces.
pub fn clean_name(raw: &str, namespaces: &NamespaceTable) -> Result<String, TemplateError> {
    Ok(NameParts::parse(raw, namespaces)?.clean_name)
}

#[derive(Debug, Clone)]
struct NameParts {
    title: Title,
    raw_name: String,
    clean_name: String,
    subst_prefix: Option<String>,
    body_start: usize,
    body_end: usize,
}

impl NameParts {
    fn parse(full_name: &str, namespaces: &NamespaceTable) -> Result<Self, TemplateError> {
        let (body_start, body_end) = name_body(full_name);
        let stripped = strip_comments(&full_name[body_start..body_end]);
        let raw = stripped.trim();
        if raw.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if raw.contains('\n') {
            return Err(TemplateError::MultilineName(raw.to_string()));
        }

        let mut subst_prefix = None;
        let mut bare = raw;
        for prefix in SUBST_PREFIXES {
            if raw
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
            {
                subst_prefix = Some(raw[..prefix.len()].to_string());
                bare = raw[prefix.len()..].trim_start();
                break;
            }
        }
        if bare.is_empty() {
            return Err(TemplateError::EmptyName);
        }

        let title = Title::parse_in(bare, NS_TEMPLATE, namespaces).map_err(|source| {
            TemplateError::InvalidName {
                name: bare.to_string(),
                source,
            }
        })?;
        if title.main().is_empty() {
            return Err(TemplateError::EmptyName);
        }
        let clean_name = match title.namespace() {
            NS_TEMPLATE => title.main_text(),
            NS_MAIN => format!(":{}", title.main_text()),
            _ => title.prefixed_text(),
        };

        Ok(Self {
            title,
            raw_name: bare.to_string(),
            clean_name,
            subst_prefix,
            body_start,
            body_end,
        })
    }
}

/// Byte range of the name once leading and trailing whitespace and comments are cut off.
fn name_body(full_name: &str) -> (usize, usize) {
    let mut start = 0usize;
    loop {
        let rest = &full_name[start..];
        let trimmed = rest.trim_start();
        start += rest.len() - trimmed.len();
        if !trimmed.starts_with("<!--") {
            break;
        }
        start = match trimmed.find("-->") {
            Some(close) => start + close + 3,
            None => full_name.len(),
        };
    }

    let mut end = full_name.len();
    loop {
        end = start + full_name[start..end].trim_end().len();
        let head = &full_name[start..end];
        if !head.ends_with("-->") {
            break;
        }
        match head.rfind("<!--") {
            Some(open) => end = start + open,
            None => break,
        }
    }
    (start, end.max(start))
}

pub(crate) fn strip_comments(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("<!--") {
        output.push_str(&rest[..open]);
        match rest[open + 4..].find("-->") {
            Some(close) => rest = &rest[open + 4 + close + 3..],
            None => return output,
        }
    }
    output.push_str(rest);
    output
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameFormat {
    /// Name without padding or comments, as written.
    Raw,
    /// Canonical name.
    Clean,
    /// Name slot exactly as written.
    #[default]
    Full,
    /// Canonical name inside the original padding.
    FullClean,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArgumentFormat {
    /// Original argument text, padding included.
    #[default]
    Unformatted,
    /// `name=value` with trimmed parts; positional arguments stay bare while they count up from 1.
    Clean,
}

pub enum LineBreakSite<'a> {
    AfterName,
    AfterArgument(&'a TemplateArgument),
}

#[derive(Default)]
pub enum LineBreaks {
    #[default]
    Never,
    Always,
    Where(Box<dyn Fn(LineBreakSite<'_>) -> bool>),
}

impl LineBreaks {
    fn wanted(&self, site: LineBreakSite<'_>) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Where(predicate) => predicate(site),
        }
    }
}

pub type ArgumentOrder = Box<dyn Fn(&TemplateArgument, &TemplateArgument) -> Ordering>;

#[derive(Default)]
pub struct RenderOptions {
    pub name: NameFormat,
    pub arguments: ArgumentFormat,
    /// Write `subst:` before the bare name.
    pub subst: bool,
    pub line_breaks: LineBreaks,
    pub sort: Option<ArgumentOrder>,
}

impl RenderOptions {
    pub fn clean() -> Self {
        Self {
            name: NameFormat::Clean,
            arguments: ArgumentFormat::Clean,
            ..Self::default()
        }
    }

    /// Whether these options reproduce a template's source text unchanged.
    pub fn is_source_exact(&self) -> bool {
        self.name == NameFormat::Full
            && self.arguments == ArgumentFormat::Unformatted
            && !self.subst
            && matches!(self.line_breaks, LineBreaks::Never)
            && self.sort.is_none()
    }
}

/// One template invocation: name variants and ordered, uniquely named arguments.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    title: Title,
    raw_name: String,
    full_name: String,
    clean_name: String,
    subst_prefix: Option<String>,
    arguments: Vec<TemplateArgument>,
    overridden: Vec<TemplateArgument>,
    hierarchy: Vec<AliasGroup>,
    #[serde(skip)]
    body_start: usize,
    #[serde(skip)]
    body_end: usize,
    #[serde(skip)]
    revision: u64,
}

impl Template {
    pub fn new(name: &str) -> Result<Self, TemplateError> {
        Self::new_in(name, NamespaceTable::standard())
    }

    pub fn new_in(full_name: &str, namespaces: &NamespaceTable) -> Result<Self, TemplateError> {
        let parts = NameParts::parse(full_name, namespaces)?;
        Ok(Self {
            title: parts.title,
            raw_name: parts.raw_name,
            full_name: full_name.to_string(),
            clean_name: parts.clean_name,
            subst_prefix: parts.subst_prefix,
            arguments: Vec::new(),
            overridden: Vec::new(),
            hierarchy: Vec::new(),
            body_start: parts.body_start,
            body_end: parts.body_end,
            revision: 0,
        })
    }

    /// Alias groups used to resolve arguments registered from now on.
    pub fn with_hierarchy(mut self, hierarchy: Vec<AliasGroup>) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    pub fn title(&self) -> &Title {
        &self.title
    }

    pub fn raw_name(&self) -> &str {
        &self.raw_name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn clean_name(&self) -> &str {
        &self.clean_name
    }

    pub fn is_subst(&self) -> bool {
        self.subst_prefix.is_some()
    }

    pub fn arguments(&self) -> &[TemplateArgument] {
        &self.arguments
    }

    pub fn overridden_arguments(&self) -> &[TemplateArgument] {
        &self.overridden
    }

    pub fn hierarchy(&self) -> &[AliasGroup] {
        &self.hierarchy
    }

    pub fn argument(&self, name: &str) -> Option<&TemplateArgument> {
        self.arguments.iter().find(|argument| argument.name == name)
    }

    pub fn argument_value(&self, name: &str) -> Option<&str> {
        self.argument(name).map(|argument| argument.value.as_str())
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.argument(name).is_some()
    }

    pub fn has_argument_where(
        &self,
        name: &str,
        predicate: impl Fn(&TemplateArgument) -> bool,
    ) -> bool {
        self.argument(name).is_some_and(predicate)
    }

    /// Count of mutations applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn add_argument(&mut self, name: &str, value: &str) {
        self.add_argument_with(TemplateArgument::named(name, value), true);
    }

    pub fn add_positional(&mut self, value: &str) {
        self.add_argument_with(TemplateArgument::positional(value), true);
    }

    /// Register `argument`, resolving name clashes through the alias
    /// hierarchy. The losing argument goes to the override log unless
    /// `log_override` is false.
    pub fn add_argument_with(&mut self, argument: TemplateArgument, log_override: bool) {
        self.revision += 1;
        self.register(argument, log_override);
    }

    /// Replace the value of `name`, keeping the padding the old value was
    /// written with. Unknown names are added as new named arguments.
    pub fn set_argument(&mut self, name: &str, value: &str) {
        let Some(argument) = self
            .arguments
            .iter_mut()
            .find(|argument| argument.name == name)
        else {
            self.add_argument(name, value);
            return;
        };
        self.revision += 1;
        let old = argument.unformatted_value.as_str();
        let leading = &old[..old.len() - old.trim_start().len()];
        let trailing = &old[old.trim_end().len()..];
        argument.unformatted_value = if old.trim().is_empty() {
            format!("{value}{trailing}")
        } else {
            format!("{leading}{value}{trailing}")
        };
        argument.value = if argument.positional {
            value.to_string()
        } else {
            value.trim().to_string()
        };
        if argument.positional && !argument.renders_bare() {
            argument.positional = false;
            argument.unformatted_name = argument.name.clone();
        }
    }

    /// Write `subst:` in front of the name from now on. No-op when the
    /// invocation already carries a substitution prefix.
    pub fn mark_subst(&mut self) {
        if self.subst_prefix.is_some() {
            return;
        }
        self.revision += 1;
        self.full_name.insert_str(self.body_start, SUBST_PREFIX);
        self.body_end += SUBST_PREFIX.len();
        self.subst_prefix = Some(SUBST_PREFIX.to_string());
    }

    pub fn delete_argument(&mut self, name: &str) -> Option<TemplateArgument> {
        let index = self
            .arguments
            .iter()
            .position(|argument| argument.name == name)?;
        self.revision += 1;
        Some(self.arguments.remove(index))
    }

    fn register(&mut self, mut argument: TemplateArgument, log_override: bool) {
        if argument.positional && argument.name.bytes().all(|byte| byte.is_ascii_digit()) {
            argument.name = self.next_positional_name();
        }

        let group = self
            .hierarchy
            .iter()
            .find(|group| group.iter().any(|alias| *alias == argument.name))
            .cloned();
        let existing = self.arguments.iter().position(|current| match &group {
            Some(group) => group.contains(&current.name),
            None => current.name == argument.name,
        });
        let Some(index) = existing else {
            self.arguments.push(argument);
            return;
        };

        let priority = |name: &str| {
            group
                .as_ref()
                .and_then(|group| group.iter().position(|alias| alias == name))
                .unwrap_or(0)
        };
        let current = &self.arguments[index];
        let replace = !argument.is_empty()
            || (current.is_empty() && priority(&argument.name) < priority(&current.name));

        let loser = if replace {
            std::mem::replace(&mut self.arguments[index], argument)
        } else {
            argument
        };
        if log_override {
            debug!(
                template = %self.clean_name,
                argument = %loser.name,
                "argument overridden"
            );
            self.overridden.push(loser);
        }
    }

    fn next_positional_name(&self) -> String {
        let mut number = 1usize;
        loop {
            let candidate = number.to_string();
            if !self.arguments.iter().any(|argument| argument.name == candidate) {
                return candidate;
            }
            number += 1;
        }
    }

    pub fn render(&self, options: &RenderOptions) -> String {
        let mut output = String::from("{{");
        output.push_str(&self.render_name(options));
        if options.line_breaks.wanted(LineBreakSite::AfterName) {
            push_line_break(&mut output);
        }

        let mut arguments: Vec<&TemplateArgument> = self.arguments.iter().collect();
        if let Some(order) = &options.sort {
            arguments.sort_by(|left, right| order(left, right));
        }

        let mut next_position = 1usize;
        for argument in arguments {
            output.push('|');
            match options.arguments {
                ArgumentFormat::Unformatted => {
                    if argument.renders_bare() {
                        output.push_str(&argument.unformatted_value);
                    } else {
                        let name = if argument.unformatted_name.is_empty() {
                            &argument.name
                        } else {
                            &argument.unformatted_name
                        };
                        output.push_str(name);
                        output.push('=');
                        output.push_str(&argument.unformatted_value);
                    }
                }
                ArgumentFormat::Clean => {
                    if argument.renders_bare() && argument.name == next_position.to_string() {
                        output.push_str(&argument.value);
                        next_position += 1;
                    } else {
                        output.push_str(&argument.name);
                        output.push('=');
                        output.push_str(argument.value.trim());
                    }
                }
            }
            if options
                .line_breaks
                .wanted(LineBreakSite::AfterArgument(argument))
            {
                push_line_break(&mut output);
            }
        }
        output.push_str("}}");
        output
    }

    fn render_name(&self, options: &RenderOptions) -> String {
        let prefix = match (&self.subst_prefix, options.subst) {
            (Some(prefix), _) => prefix.as_str(),
            (None, true) => SUBST_PREFIX,
            (None, false) => "",
        };
        let leading = &self.full_name[..self.body_start];
        let trailing = &self.full_name[self.body_end..];
        match options.name {
            NameFormat::Raw => format!("{prefix}{}", self.raw_name),
            NameFormat::Clean => format!("{prefix}{}", self.clean_name),
            NameFormat::Full if options.subst && self.subst_prefix.is_none() => format!(
                "{leading}subst:{}{trailing}",
                &self.full_name[self.body_start..self.body_end]
            ),
            NameFormat::Full => self.full_name.clone(),
            NameFormat::FullClean => format!("{leading}{prefix}{}{trailing}", self.clean_name),
        }
    }
}

fn push_line_break(output: &mut String) {
    if !output.ends_with('\n') {
        output.push('\n');
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&RenderOptions::default()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locate {
    /// Use the recorded span when the host still holds the original text
    /// there, otherwise search for the text.
    #[default]
    SpanThenSearch,
    SearchOnly,
}

#[derive(Default)]
pub struct ReplaceOptions {
    /// Replacement text; the rendered template when absent.
    pub with: Option<String>,
    pub render: RenderOptions,
    pub locate: Locate,
}

impl ReplaceOptions {
    pub fn remove() -> Self {
        Self {
            with: Some(String::new()),
            ..Self::default()
        }
    }
}

/// A template found in page text, with the exact source it was read from.
#[derive(Debug, Clone)]
pub struct ParsedTemplate {
    template: Template,
    text: String,
    start: usize,
    end: usize,
    nest_level: usize,
    parsed_revision: u64,
}

impl ParsedTemplate {
    pub(crate) fn new(template: Template, text: &str, start: usize, nest_level: usize) -> Self {
        Self {
            parsed_revision: template.revision,
            template,
            text: text.to_string(),
            start,
            end: start + text.len(),
            nest_level,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn template_mut(&mut self) -> &mut Template {
        &mut self.template
    }

    /// Source text of the invocation, braces included.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn nest_level(&self) -> usize {
        self.nest_level
    }

    pub fn is_modified(&self) -> bool {
        self.template.revision != self.parsed_revision
    }

    /// Render the template; an untouched template with source-exact
    /// options yields its original text.
    pub fn render(&self, options: &RenderOptions) -> String {
        if !self.is_modified() && options.is_source_exact() {
            return self.text.clone();
        }
        self.template.render(options)
    }

    /// Write this template into `host` in place of its original text.
    /// Returns `host` unchanged when the original text cannot be found.
    pub fn replace_in(&self, host: &str, options: &ReplaceOptions) -> String {
        let replacement = match &options.with {
            Some(text) => text.clone(),
            None => self.render(&options.render),
        };

        let at_span = options.locate == Locate::SpanThenSearch
            && host.get(self.start..self.end) == Some(self.text.as_str());
        let (mut start, mut end) = if at_span {
            (self.start, self.end)
        } else {
            match host.find(&self.text) {
                Some(found) => {
                    if options.locate == Locate::SpanThenSearch {
                        debug!(
                            template = %self.template.clean_name,
                            recorded = self.start,
                            found,
                            "template moved since parsing; using text search"
                        );
                    }
                    (found, found + self.text.len())
                }
                None => {
                    warn!(
                        template = %self.template.clean_name,
                        "template text no longer present in page"
                    );
                    return host.to_string();
                }
            }
        };

        if replacement.is_empty() {
            (start, end) = widen_over_blank_line(host, start, end);
        }

        let mut output = String::with_capacity(host.len() + replacement.len());
        output.push_str(&host[..start]);
        output.push_str(&replacement);
        output.push_str(&host[end..]);
        output
    }
}

/// When `start..end` fills a whole line, extend it over one adjacent line break.
fn widen_over_blank_line(host: &str, start: usize, end: usize) -> (usize, usize) {
    let line_begins = start == 0 || host[..start].ends_with('\n');
    let after = &host[end..];
    let line_ends = after.is_empty() || after.starts_with('\n') || after.starts_with("\r\n");
    if !line_begins || !line_ends {
        return (start, end);
    }
    if after.starts_with("\r\n") {
        (start, end + 2)
    } else if after.starts_with('\n') {
        (start, end + 1)
    } else if host[..start].ends_with("\r\n") {
        (start - 2, end)
    } else if start > 0 {
        (start - 1, end)
    } else {
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::NamespaceInfo;

    fn user_link() -> Template {
        Template::new("User link")
            .expect("valid name")
            .with_hierarchy(vec![vec!["1".to_string(), "user".to_string()]])
    }

    #[test]
    fn names_are_canonicalized_by_namespace() {
        let template = Template::new(" template:foo_bar <!-- x -->\n").expect("valid name");
        assert_eq!(template.raw_name(), "template:foo_bar");
        assert_eq!(template.clean_name(), "Foo bar");
        assert_eq!(template.full_name(), " template:foo_bar <!-- x -->\n");

        assert_eq!(Template::new(":main page").expect("main").clean_name(), ":Main page");
        assert_eq!(
            Template::new("user:Bob/box").expect("user").clean_name(),
            "User:Bob/box"
        );
    }

    #[test]
    fn subst_prefix_is_recognized_and_ignored_for_naming() {
        let template = Template::new("SafeSubst: welcome").expect("valid name");
        assert!(template.is_subst());
        assert_eq!(template.clean_name(), "Welcome");
        assert!(!Template::new("Welcome").expect("plain").is_subst());
    }

    #[test]
    fn mark_subst_keeps_name_padding() {
        let mut template = Template::new(" <!--x--> welcome\n").expect("valid name");
        template.mark_subst();
        assert!(template.is_subst());
        assert_eq!(template.revision(), 1);
        assert_eq!(template.full_name(), " <!--x--> subst:welcome\n");
        assert_eq!(template.to_string(), "{{ <!--x--> subst:welcome\n}}");

        template.mark_subst();
        assert_eq!(template.revision(), 1);
    }

    #[test]
    fn invalid_names_are_errors() {
        assert_eq!(Template::new("  ").unwrap_err(), TemplateError::EmptyName);
        assert_eq!(Template::new("<!-- only -->").unwrap_err(), TemplateError::EmptyName);
        assert!(matches!(
            Template::new("a\nb"),
            Err(TemplateError::MultilineName(_))
        ));
        assert!(matches!(
            Template::new("a[b]"),
            Err(TemplateError::InvalidName { .. })
        ));
    }

    #[test]
    fn custom_namespaces_affect_clean_names() {
        let mut table = NamespaceTable::default();
        table.insert(NamespaceInfo {
            id: 3000,
            name: "Portal".to_string(),
            aliases: vec![],
            case_sensitive: false,
        });
        let template = Template::new_in("portal:news", &table).expect("valid name");
        assert_eq!(template.clean_name(), "Portal:News");
    }

    #[test]
    fn positional_arguments_take_the_lowest_free_number() {
        let mut template = Template::new("T").expect("valid name");
        template.add_argument("2", "named two");
        template.add_positional("first");
        template.add_positional("third");
        let names: Vec<&str> = template.arguments().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["2", "1", "3"]);
        assert_eq!(template.argument_value("3"), Some("third"));
    }

    #[test]
    fn hierarchy_keeps_higher_priority_over_empty_alias() {
        let mut template = user_link();
        template.add_argument("1", "x");
        template.add_argument("user", "");
        assert_eq!(template.arguments().len(), 1);
        assert_eq!(template.argument_value("1"), Some("x"));

        template.add_argument("user", "y");
        assert_eq!(template.arguments().len(), 1);
        assert_eq!(template.argument_value("user"), Some("y"));
        assert!(!template.has_argument("1"));
        assert!(
            template
                .overridden_arguments()
                .iter()
                .any(|argument| argument.name == "1" && argument.value == "x")
        );
    }

    #[test]
    fn empty_arguments_yield_unless_strictly_higher_priority() {
        let mut template = user_link();
        template.add_argument("user", "");
        template.add_argument("1", "");
        assert_eq!(template.arguments()[0].name, "1");

        let mut template = Template::new("T").expect("valid name");
        template.add_argument("a", "kept");
        template.add_argument("a", " ");
        assert_eq!(template.argument_value("a"), Some("kept"));
        template.add_argument_with(TemplateArgument::named("a", "later"), false);
        assert_eq!(template.argument_value("a"), Some("later"));
        assert_eq!(template.overridden_arguments().len(), 1);
    }

    #[test]
    fn set_argument_keeps_padding() {
        let mut template = Template::new("T").expect("valid name");
        template.add_argument_with(TemplateArgument::from_raw(" a = old\n", Some(3)), false);
        template.set_argument("a", "new");
        assert_eq!(template.render(&RenderOptions::default()), "{{T| a = new\n}}");

        template.set_argument("b", "added");
        assert_eq!(template.argument_value("b"), Some("added"));
        assert!(template.delete_argument("a").is_some());
        assert!(template.delete_argument("a").is_none());
        assert_eq!(template.to_string(), "{{T|b=added}}");
    }

    #[test]
    fn positional_values_with_equals_render_named() {
        let mut template = Template::new("T").expect("valid name");
        template.add_positional("a=b");
        template.add_positional("{{x|k=v}}");
        assert_eq!(template.to_string(), "{{T|1=a=b|{{x|k=v}}}}");
    }

    #[test]
    fn equals_inside_comments_keep_positionals_bare() {
        let mut template = Template::new("T").expect("valid name");
        template.add_positional("<!-- a=b -->x");
        template.add_positional("<nowiki>=</nowiki>");
        template.add_argument("k", "v");
        assert_eq!(
            template.to_string(),
            "{{T|<!-- a=b -->x|<nowiki>=</nowiki>|k=v}}"
        );

        template.set_argument("1", "<!-- c=d -->y");
        assert!(template.argument("1").is_some_and(|argument| argument.positional));
        assert_eq!(
            template.to_string(),
            "{{T|<!-- c=d -->y|<nowiki>=</nowiki>|k=v}}"
        );
    }

    #[test]
    fn render_options_control_name_and_layout() {
        let mut template = Template::new(" template:infobox ").expect("valid name");
        template.add_positional("p");
        template.add_argument("name", "Foo");
        template.add_argument("age", "3");

        let options = RenderOptions {
            subst: true,
            line_breaks: LineBreaks::Always,
            sort: Some(Box::new(|left: &TemplateArgument, right: &TemplateArgument| {
                left.name.cmp(&right.name)
            })),
            ..RenderOptions::clean()
        };
        assert_eq!(
            template.render(&options),
            "{{subst:Infobox\n|p\n|age=3\n|name=Foo\n}}"
        );

        let options = RenderOptions {
            name: NameFormat::FullClean,
            line_breaks: LineBreaks::Where(Box::new(|site: LineBreakSite<'_>| {
                matches!(site, LineBreakSite::AfterArgument(argument) if argument.name == "name")
            })),
            ..RenderOptions::default()
        };
        assert_eq!(template.render(&options), "{{ Infobox |p|name=Foo\n|age=3}}");

        let options = RenderOptions {
            name: NameFormat::Full,
            subst: true,
            ..RenderOptions::default()
        };
        assert_eq!(template.render(&options), "{{ subst:template:infobox |p|name=Foo|age=3}}");
    }

    #[test]
    fn replace_in_uses_span_then_search() {
        let host = "a {{T|x}} b";
        let template = Template::new("T").expect("valid name");
        let mut parsed = ParsedTemplate::new(template, "{{T|x}}", 2, 0);
        assert_eq!(parsed.replace_in(host, &ReplaceOptions::default()), host);

        parsed.template_mut().add_argument("y", "1");
        assert_eq!(
            parsed.replace_in(host, &ReplaceOptions::default()),
            "a {{T|y=1}} b"
        );

        let moved = "prefix a {{T|x}} b";
        assert_eq!(
            parsed.replace_in(moved, &ReplaceOptions::default()),
            "prefix a {{T|y=1}} b"
        );
        assert_eq!(parsed.replace_in("gone", &ReplaceOptions::default()), "gone");
    }

    #[test]
    fn removing_a_template_on_its_own_line_drops_the_line() {
        let host = "one\n{{T}}\ntwo";
        let parsed = ParsedTemplate::new(Template::new("T").expect("valid name"), "{{T}}", 4, 0);
        assert_eq!(parsed.replace_in(host, &ReplaceOptions::remove()), "one\ntwo");

        let inline = "one {{T}} two";
        let parsed = ParsedTemplate::new(Template::new("T").expect("valid name"), "{{T}}", 4, 0);
        assert_eq!(parsed.replace_in(inline, &ReplaceOptions::remove()), "one  two");

        let last = "one\n{{T}}";
        let parsed = ParsedTemplate::new(Template::new("T").expect("valid name"), "{{T}}", 4, 0);
        assert_eq!(parsed.replace_in(last, &ReplaceOptions::remove()), "one");
    }

    #[test]
    fn removal_handles_crlf_line_breaks() {
        let parsed = ParsedTemplate::new(Template::new("T").expect("valid name"), "{{T}}", 5, 0);
        let host = "one\r\n{{T}}\r\ntwo";
        assert_eq!(parsed.replace_in(host, &ReplaceOptions::remove()), "one\r\ntwo");
        let last = "one\r\n{{T}}";
        assert_eq!(parsed.replace_in(last, &ReplaceOptions::remove()), "one");
    }

    #[test]
    fn search_only_takes_the_first_occurrence() {
        let host = "{{T|x}} a {{T|x}}";
        let mut template = Template::new("T").expect("valid name");
        template.add_positional("x");
        let mut parsed = ParsedTemplate::new(template, "{{T|x}}", 10, 0);
        parsed.template_mut().set_argument("1", "y");

        assert_eq!(
            parsed.replace_in(host, &ReplaceOptions::default()),
            "{{T|x}} a {{T|y}}"
        );
        let options = ReplaceOptions {
            locate: Locate::SearchOnly,
            ..ReplaceOptions::default()
        };
        assert_eq!(parsed.replace_in(host, &options), "{{T|y}} a {{T|x}}");
    }

    #[test]
    fn hierarchies_are_keyed_by_clean_name() {
        let mut hierarchies = Hierarchies::default();
        hierarchies.insert("template:user_link", vec![vec!["1".into(), "user".into()]]);
        assert!(hierarchies.get("User link").is_some());
        assert!(hierarchies.get("user link").is_none());
    }
}
