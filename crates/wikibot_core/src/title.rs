use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::Serialize;
use thiserror::Error;

use crate::case_map::upper_first;

pub const NS_MEDIA: i32 = -2;
pub const NS_SPECIAL: i32 = -1;
pub const NS_MAIN: i32 = 0;
pub const NS_TALK: i32 = 1;
pub const NS_USER: i32 = 2;
pub const NS_FILE: i32 = 6;
pub const NS_TEMPLATE: i32 = 10;
pub const NS_CATEGORY: i32 = 14;
pub const NS_MODULE: i32 = 828;

/// Size of the title column on the wiki side.
pub const TITLE_MAX_BYTES: usize = 255;
pub const SPECIAL_TITLE_MAX_BYTES: usize = 512;
/// Upload names are capped lower so the stored file name (with extension) fits.
pub const FILENAME_MAX_BYTES: usize = 240;

const STANDARD_NAMESPACES: &[(i32, &str, &[&str])] = &[
    (NS_MEDIA, "Media", &[]),
    (NS_SPECIAL, "Special", &[]),
    (NS_MAIN, "", &[]),
    (NS_TALK, "Talk", &[]),
    (NS_USER, "User", &[]),
    (3, "User_talk", &[]),
    (4, "Project", &[]),
    (5, "Project_talk", &[]),
    (NS_FILE, "File", &["Image"]),
    (7, "File_talk", &["Image_talk"]),
    (8, "MediaWiki", &[]),
    (9, "MediaWiki_talk", &[]),
    (NS_TEMPLATE, "Template", &[]),
    (11, "Template_talk", &[]),
    (12, "Help", &[]),
    (13, "Help_talk", &[]),
    (NS_CATEGORY, "Category", &[]),
    (15, "Category_talk", &[]),
    (NS_MODULE, "Module", &[]),
    (829, "Module_talk", &[]),
];

static STANDARD_TABLE: LazyLock<NamespaceTable> = LazyLock::new(NamespaceTable::build_standard);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TitleError {
    #[error("title is empty")]
    Empty,
    #[error("title contains the Unicode replacement character")]
    ReplacementCharacter,
    #[error("title contains illegal sequence `{0}`")]
    IllegalCharacter(String),
    #[error("title navigates a relative path")]
    RelativePath,
    #[error("title contains the signature marker `~~~`")]
    Signature,
    #[error("title is {bytes} bytes long (limit {limit})")]
    TooLong { bytes: usize, limit: usize },
    #[error("title names a namespace without a page")]
    NamespaceOnly,
    #[error("title starts with a colon after namespace resolution")]
    LeadingColon,
    #[error("talk page title carries a second namespace prefix `{0}`")]
    TalkNamespacePrefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceInfo {
    pub id: i32,
    /// Canonical name in db form (`User_talk`); empty for the main namespace.
    pub name: String,
    pub aliases: Vec<String>,
    pub case_sensitive: bool,
}

/// Namespace names and aliases keyed for title prefix resolution.
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    namespaces: Vec<NamespaceInfo>,
    by_name: HashMap<String, i32>,
}

impl NamespaceTable {
    /// The stock namespace set every wiki ships with.
    pub fn standard() -> &'static NamespaceTable {
        &STANDARD_TABLE
    }

    fn build_standard() -> Self {
        let mut table = Self {
            namespaces: Vec::new(),
            by_name: HashMap::new(),
        };
        for (id, name, aliases) in STANDARD_NAMESPACES {
            table.insert(NamespaceInfo {
                id: *id,
                name: (*name).to_string(),
                aliases: aliases.iter().map(|alias| (*alias).to_string()).collect(),
                case_sensitive: false,
            });
        }
        table
    }

    /// Add or replace a namespace. Later inserts win on name collisions.
    pub fn insert(&mut self, info: NamespaceInfo) {
        let mut info = info;
        info.name = info.name.trim().replace(' ', "_");
        for alias in &mut info.aliases {
            *alias = alias.trim().replace(' ', "_");
        }
        self.namespaces.retain(|existing| existing.id != info.id);
        self.by_name.retain(|_, id| *id != info.id);
        if !info.name.is_empty() {
            self.by_name.insert(lookup_key(&info.name), info.id);
        }
        for alias in info.aliases.iter().filter(|alias| !alias.is_empty()) {
            self.by_name.insert(lookup_key(alias), info.id);
        }
        self.namespaces.push(info);
        self.namespaces.sort_by_key(|namespace| namespace.id);
    }

    /// Resolve a prefix such as `user_talk` or `Image` to its namespace id.
    /// Only the first letter is matched case-insensitively.
    pub fn id_for(&self, name: &str) -> Option<i32> {
        let normalized = name.trim_matches(|ch| ch == ' ' || ch == '_').replace(' ', "_");
        if normalized.is_empty() {
            return None;
        }
        self.by_name.get(&lookup_key(&normalized)).copied()
    }

    pub fn get(&self, id: i32) -> Option<&NamespaceInfo> {
        self.namespaces.iter().find(|namespace| namespace.id == id)
    }

    pub fn name_of(&self, id: i32) -> Option<&str> {
        self.get(id).map(|namespace| namespace.name.as_str())
    }

    pub fn is_case_sensitive(&self, id: i32) -> bool {
        self.get(id).is_some_and(|namespace| namespace.case_sensitive)
    }
}

impl Default for NamespaceTable {
    fn default() -> Self {
        Self::standard().clone()
    }
}

fn lookup_key(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A canonical page name: namespace id, db-form title and optional fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Title {
    namespace: i32,
    title: String,
    fragment: Option<String>,
    #[serde(skip)]
    prefix: String,
}

impl Title {
    /// Strictly parse `raw` against the standard namespace table.
    pub fn parse(raw: &str, default_namespace: i32) -> Result<Self, TitleError> {
        Self::parse_in(raw, default_namespace, NamespaceTable::standard())
    }

    pub fn parse_in(
        raw: &str,
        default_namespace: i32,
        namespaces: &NamespaceTable,
    ) -> Result<Self, TitleError> {
        let mut namespace = default_namespace;
        let normalized = normalize_whitespace(&strip_bidi(raw));
        if normalized.contains('\u{FFFD}') {
            return Err(TitleError::ReplacementCharacter);
        }

        let mut rest = normalized.as_str();
        if let Some(stripped) = rest.strip_prefix(':') {
            namespace = NS_MAIN;
            rest = stripped.trim_matches('_');
        }
        if rest.is_empty() {
            return Err(TitleError::Empty);
        }

        if let Some((prefix, remainder)) = split_namespace(rest)
            && let Some(id) = namespaces.id_for(prefix)
        {
            namespace = id;
            rest = remainder;
            if namespace == NS_TALK
                && let Some((inner, _)) = split_namespace(rest)
                && namespaces.id_for(inner).is_some()
            {
                return Err(TitleError::TalkNamespacePrefix(inner.to_string()));
            }
        }

        let (main, fragment) = match rest.find('#') {
            Some(hash) => (
                rest[..hash].trim_matches('_'),
                Some(rest[hash + 1..].replace('_', " ")),
            ),
            None => (rest, None),
        };

        if let Some(illegal) = find_illegal(main) {
            return Err(TitleError::IllegalCharacter(illegal));
        }
        if is_relative_path(main) {
            return Err(TitleError::RelativePath);
        }
        if main.contains("~~~") {
            return Err(TitleError::Signature);
        }
        let limit = if namespace == NS_SPECIAL {
            SPECIAL_TITLE_MAX_BYTES
        } else {
            TITLE_MAX_BYTES
        };
        if main.len() > limit {
            return Err(TitleError::TooLong {
                bytes: main.len(),
                limit,
            });
        }
        if main.is_empty() && namespace != NS_MAIN {
            return Err(TitleError::NamespaceOnly);
        }
        if main.starts_with(':') {
            return Err(TitleError::LeadingColon);
        }

        let title = if namespaces.is_case_sensitive(namespace) {
            main.to_string()
        } else {
            upper_first(main)
        };
        let prefix = namespaces.name_of(namespace).unwrap_or_default().to_string();
        Ok(Self {
            namespace,
            title,
            fragment,
            prefix,
        })
    }

    /// Lenient parse for free-form user input. Forbidden characters are
    /// replaced, over-long names are cut to size, and `None` comes back only
    /// when nothing usable is left.
    pub fn new_from_user_input(raw: &str, default_namespace: i32) -> Option<Self> {
        Self::new_from_user_input_in(raw, default_namespace, NamespaceTable::standard())
    }

    pub fn new_from_user_input_in(
        raw: &str,
        default_namespace: i32,
        namespaces: &NamespaceTable,
    ) -> Option<Self> {
        let mut namespace = default_namespace;
        let spaced: String = raw
            .chars()
            .map(|ch| if ch.is_whitespace() { ' ' } else { ch })
            .collect();
        let mut text = spaced.trim();
        if let Some(stripped) = text.strip_prefix(':') {
            namespace = NS_MAIN;
            text = stripped.trim_matches(|ch| ch == '_' || ch == ' ');
        }
        let mut namespace_prefix = None;
        if let Some((prefix, remainder)) = split_namespace(text)
            && let Some(id) = namespaces.id_for(prefix)
        {
            namespace = id;
            namespace_prefix = Some(prefix);
            text = remainder;
        }

        let mut sanitized = if namespace == NS_MEDIA || namespace == NS_FILE {
            let cleaned = sanitize(text, true);
            let (name, extension) = cleaned.rsplit_once('.')?;
            let budget = FILENAME_MAX_BYTES.saturating_sub(extension.len() + 1);
            format!("{}.{extension}", truncate_bytes(name.trim(), budget))
        } else {
            let cleaned = sanitize(text, false);
            if namespace == NS_SPECIAL {
                cleaned
            } else {
                truncate_bytes(&cleaned, TITLE_MAX_BYTES).to_string()
            }
        };
        let stripped = sanitized.trim_start_matches(':');
        if stripped.len() != sanitized.len() {
            sanitized = stripped.to_string();
        }
        // File names had their colons replaced, every other remainder is
        // parsed again under its prefix so nested prefixes resolve as in `parse`.
        if let Some(prefix) = namespace_prefix
            && namespace != NS_MEDIA
            && namespace != NS_FILE
        {
            sanitized = format!("{prefix}:{sanitized}");
        }
        Self::parse_in(&sanitized, namespace, namespaces).ok()
    }

    pub fn namespace(&self) -> i32 {
        self.namespace
    }

    /// Db-form title without namespace prefix (`Foo_bar`).
    pub fn main(&self) -> &str {
        &self.title
    }

    pub fn main_text(&self) -> String {
        self.title.replace('_', " ")
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn namespace_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn prefixed_db(&self) -> String {
        if self.prefix.is_empty() {
            self.title.clone()
        } else {
            format!("{}:{}", self.prefix, self.title)
        }
    }

    pub fn prefixed_text(&self) -> String {
        self.prefixed_db().replace('_', " ")
    }

    /// Prefixed text plus `#fragment`; parses back to an equal title.
    pub fn full_text(&self) -> String {
        match &self.fragment {
            Some(fragment) => format!("{}#{fragment}", self.prefixed_text()),
            None => self.prefixed_text(),
        }
    }

    pub fn is_talk(&self) -> bool {
        self.namespace > 0 && self.namespace % 2 == 1
    }

    /// The talk page belonging to this title, if its namespace has one.
    pub fn talk_page(&self, namespaces: &NamespaceTable) -> Option<Self> {
        if self.is_talk() {
            return Some(self.clone());
        }
        if self.namespace < 0 {
            return None;
        }
        self.in_namespace(self.namespace + 1, namespaces)
    }

    pub fn subject_page(&self, namespaces: &NamespaceTable) -> Option<Self> {
        if !self.is_talk() {
            return Some(self.clone());
        }
        self.in_namespace(self.namespace - 1, namespaces)
    }

    /// Extension of a File/Media title (`png` for `File:A.png`).
    pub fn extension(&self) -> Option<&str> {
        if self.namespace != NS_FILE && self.namespace != NS_MEDIA {
            return None;
        }
        self.title
            .rsplit_once('.')
            .map(|(_, extension)| extension)
            .filter(|extension| !extension.is_empty())
    }

    fn in_namespace(&self, namespace: i32, namespaces: &NamespaceTable) -> Option<Self> {
        let prefix = namespaces.name_of(namespace)?.to_string();
        let title = if namespaces.is_case_sensitive(namespace) {
            self.title.clone()
        } else {
            upper_first(&self.title)
        };
        Some(Self {
            namespace,
            title,
            fragment: None,
            prefix,
        })
    }
}

impl fmt::Display for Title {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.full_text())
    }
}

fn strip_bidi(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !matches!(ch, '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}'))
        .collect()
}

fn is_title_space(ch: char) -> bool {
    matches!(
        ch,
        ' ' | '_'
            | '\u{00A0}'
            | '\u{1680}'
            | '\u{180E}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

/// Collapse runs of space-like characters into one underscore and trim them at both ends.
fn normalize_whitespace(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut previous_was_space = false;
    for ch in value.chars() {
        if is_title_space(ch) {
            if !previous_was_space {
                output.push('_');
                previous_was_space = true;
            }
        } else {
            output.push(ch);
            previous_was_space = false;
        }
    }
    output.trim_matches('_').to_string()
}

/// Split `prefix:rest` at the first colon that has at least one character before it.
fn split_namespace(value: &str) -> Option<(&str, &str)> {
    let (colon, _) = value.char_indices().skip(1).find(|(_, ch)| *ch == ':')?;
    let is_gap = |ch: char| ch == '_' || ch == ' ';
    let prefix = value[..colon].trim_end_matches(is_gap);
    let rest = value[colon + 1..].trim_start_matches(is_gap);
    if prefix.is_empty() {
        return None;
    }
    Some((prefix, rest))
}

fn is_illegal_char(ch: char) -> bool {
    matches!(
        ch,
        '\u{0}'..='\u{1F}' | '\u{7F}' | '#' | '<' | '>' | '[' | ']' | '{' | '}' | '|'
    )
}

/// First illegal sequence in a title: a forbidden character, a percent
/// escape, or an HTML character reference.
fn find_illegal(value: &str) -> Option<String> {
    if let Some(ch) = value.chars().find(|ch| is_illegal_char(*ch)) {
        return Some(ch.to_string());
    }
    let bytes = value.as_bytes();
    for (index, byte) in bytes.iter().enumerate() {
        match byte {
            b'%' if is_percent_escape(bytes, index) => {
                return Some(value[index..index + 3].to_string());
            }
            b'&' => {
                if let Some(end) = entity_end(value, index) {
                    return Some(value[index..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn is_percent_escape(bytes: &[u8], index: usize) -> bool {
    index + 2 < bytes.len()
        && bytes[index + 1].is_ascii_hexdigit()
        && bytes[index + 2].is_ascii_hexdigit()
}

/// End (exclusive) of an `&name;` reference starting at `index`.
fn entity_end(value: &str, index: usize) -> Option<usize> {
    let rest = &value[index + 1..];
    let mut length = 0usize;
    for ch in rest.chars() {
        if ch == ';' {
            return (length > 0).then_some(index + 1 + length + 1);
        }
        if !(ch.is_ascii_alphanumeric() || u32::from(ch) >= 0x80) {
            return None;
        }
        length += ch.len_utf8();
    }
    None
}

fn is_relative_path(value: &str) -> bool {
    value.contains('.')
        && (value == "."
            || value == ".."
            || value.starts_with("./")
            || value.starts_with("../")
            || value.contains("/./")
            || value.contains("/../")
            || value.ends_with("/.")
            || value.ends_with("/.."))
}

fn sanitize(value: &str, file_rules: bool) -> String {
    let mut text = value.replace("~~~", "");
    text.retain(|ch| !matches!(ch, '\u{0}'..='\u{1F}' | '\u{7F}'));

    let mut output = String::with_capacity(text.len() + 8);
    for (index, ch) in text.char_indices() {
        match ch {
            '%' if is_percent_escape(text.as_bytes(), index) => output.push_str("% "),
            '&' if entity_end(&text, index).is_some() => output.push_str("& "),
            ':' | '/' | '\\' if file_rules => output.push('-'),
            '}' | ']' | '>' => output.push(')'),
            '{' | '[' | '<' => output.push('('),
            ch if is_illegal_char(ch) => output.push('-'),
            ch => output.push(ch),
        }
    }

    if is_relative_path(&output) {
        return String::new();
    }
    output
}

fn truncate_bytes(value: &str, limit: usize) -> &str {
    if value.len() <= limit {
        return value;
    }
    let mut end = limit;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_whitespace_and_first_letter() {
        let title = Title::parse("  foo  _bar\u{00A0}baz ", NS_MAIN).expect("title");
        assert_eq!(title.namespace(), NS_MAIN);
        assert_eq!(title.main(), "Foo_bar_baz");
        assert_eq!(title.prefixed_text(), "Foo bar baz");
        assert!(title.fragment().is_none());
    }

    #[test]
    fn parse_resolves_namespace_prefixes_and_aliases() {
        let title = Title::parse("user talk: example", NS_MAIN).expect("title");
        assert_eq!(title.namespace(), 3);
        assert_eq!(title.prefixed_db(), "User_talk:Example");

        let image = Title::parse("Image:Logo.png", NS_MAIN).expect("title");
        assert_eq!(image.namespace(), NS_FILE);
        assert_eq!(image.prefixed_text(), "File:Logo.png");
        assert_eq!(image.extension(), Some("png"));
    }

    #[test]
    fn namespace_lookup_is_only_case_insensitive_on_first_letter() {
        assert_eq!(
            Title::parse("template:Foo", NS_MAIN).expect("title").namespace(),
            NS_TEMPLATE
        );
        let shouted = Title::parse("TEMPLATE:Foo", NS_MAIN).expect("title");
        assert_eq!(shouted.namespace(), NS_MAIN);
        assert_eq!(shouted.main(), "TEMPLATE:Foo");
    }

    #[test]
    fn leading_colon_forces_main_namespace() {
        let title = Title::parse(":Foo", NS_TEMPLATE).expect("title");
        assert_eq!(title.namespace(), NS_MAIN);
        assert_eq!(title.main(), "Foo");

        let default = Title::parse("Foo", NS_TEMPLATE).expect("title");
        assert_eq!(default.prefixed_text(), "Template:Foo");
    }

    #[test]
    fn fragment_is_split_after_namespace_resolution() {
        let title = Title::parse("Help:Editing_pages#_Links_here", NS_MAIN).expect("title");
        assert_eq!(title.namespace(), 12);
        assert_eq!(title.main(), "Editing_pages");
        assert_eq!(title.fragment(), Some(" Links here"));
        assert_eq!(title.full_text(), "Help:Editing pages# Links here");
    }

    #[test]
    fn talk_titles_cannot_carry_a_second_namespace() {
        assert_eq!(
            Title::parse("Talk:File:X.png", NS_MAIN),
            Err(TitleError::TalkNamespacePrefix("File".to_string()))
        );
        assert!(Title::parse("Talk:Foo:bar", NS_MAIN).is_ok());
    }

    #[test]
    fn illegal_sequences_are_rejected() {
        assert!(matches!(
            Title::parse("Foo[bar]", NS_MAIN),
            Err(TitleError::IllegalCharacter(_))
        ));
        assert!(matches!(
            Title::parse("Foo%20bar", NS_MAIN),
            Err(TitleError::IllegalCharacter(_))
        ));
        assert!(matches!(
            Title::parse("Foo&amp;bar", NS_MAIN),
            Err(TitleError::IllegalCharacter(_))
        ));
        assert!(matches!(
            Title::parse("Foo\u{1}", NS_MAIN),
            Err(TitleError::IllegalCharacter(_))
        ));
        assert_eq!(
            Title::parse("Sig ~~~ here", NS_MAIN),
            Err(TitleError::Signature)
        );
        assert_eq!(Title::parse("..", NS_MAIN), Err(TitleError::RelativePath));
        assert_eq!(Title::parse("a/../b", NS_MAIN), Err(TitleError::RelativePath));
        assert!(Title::parse("A.B", NS_MAIN).is_ok());
    }

    #[test]
    fn empty_and_namespace_only_titles_are_rejected() {
        assert_eq!(Title::parse("  ", NS_MAIN), Err(TitleError::Empty));
        assert_eq!(Title::parse("User:", NS_MAIN), Err(TitleError::NamespaceOnly));
        assert_eq!(
            Title::parse("Category:#frag", NS_MAIN),
            Err(TitleError::NamespaceOnly)
        );
        assert_eq!(Title::parse("::Foo", NS_MAIN), Err(TitleError::LeadingColon));
    }

    #[test]
    fn byte_length_ceiling_applies_outside_special() {
        let exact = "a".repeat(255);
        assert!(Title::parse(&exact, NS_MAIN).is_ok());

        let long = "a".repeat(256);
        assert_eq!(
            Title::parse(&long, NS_MAIN),
            Err(TitleError::TooLong {
                bytes: 256,
                limit: 255
            })
        );
        assert!(Title::parse(&format!("Special:{long}"), NS_MAIN).is_ok());
    }

    #[test]
    fn rendering_round_trips_through_parse() {
        for raw in [
            "foo bar",
            "Template:Infobox person",
            "user_talk:Example/Archive 1",
            "Help:Contents#See also",
            ":Category:People",
            "Special:Contributions/127.0.0.1",
        ] {
            let first = Title::parse(raw, NS_MAIN).expect("first parse");
            let second = Title::parse(&first.full_text(), NS_MAIN).expect("second parse");
            assert_eq!(first, second, "{raw}");
        }
    }

    #[test]
    fn case_sensitive_namespaces_keep_first_letter() {
        let mut namespaces = NamespaceTable::standard().clone();
        namespaces.insert(NamespaceInfo {
            id: 3000,
            name: "Lore book".to_string(),
            aliases: vec!["LB".to_string()],
            case_sensitive: true,
        });
        let title = Title::parse_in("lB:entry", NS_MAIN, &namespaces).expect("title");
        assert_eq!(title.namespace(), 3000);
        assert_eq!(title.prefixed_text(), "Lore book:entry");
    }

    #[test]
    fn talk_and_subject_pages_swap_namespaces() {
        let namespaces = NamespaceTable::standard();
        let title = Title::parse("Template:Foo", NS_MAIN).expect("title");
        let talk = title.talk_page(namespaces).expect("talk");
        assert_eq!(talk.prefixed_text(), "Template talk:Foo");
        assert!(talk.is_talk());
        assert_eq!(talk.subject_page(namespaces).expect("subject"), title);
        let special = Title::parse("Special:Foo", NS_MAIN).expect("special");
        assert!(special.talk_page(namespaces).is_none());
    }

    #[test]
    fn user_input_is_sanitized_instead_of_rejected() {
        let title = Title::new_from_user_input("Foo [bar] {baz} ~~~ | x", NS_MAIN).expect("title");
        assert_eq!(title.prefixed_text(), "Foo (bar) (baz) - x");

        let escaped = Title::new_from_user_input("100%25 &amp; more", NS_MAIN).expect("title");
        assert_eq!(escaped.prefixed_text(), "100% 25 & amp; more");

        assert!(Title::new_from_user_input("   ", NS_MAIN).is_none());
        assert!(Title::new_from_user_input("..", NS_MAIN).is_none());
    }

    #[test]
    fn user_input_trims_file_names_by_extension_budget() {
        let raw = format!("File:{}.jpeg", "n".repeat(300));
        let title = Title::new_from_user_input(&raw, NS_MAIN).expect("title");
        assert_eq!(title.namespace(), NS_FILE);
        assert_eq!(title.main().len(), FILENAME_MAX_BYTES);
        assert!(title.main().ends_with(".jpeg"));

        let slashed = Title::new_from_user_input("File:a/b:c.png", NS_MAIN).expect("title");
        assert_eq!(slashed.main(), "A-b-c.png");

        assert!(Title::new_from_user_input("File:no extension", NS_MAIN).is_none());
    }

    #[test]
    fn user_input_trims_long_titles() {
        let raw = "é".repeat(200);
        let title = Title::new_from_user_input(&raw, NS_MAIN).expect("title");
        assert!(title.main().len() <= TITLE_MAX_BYTES);
        assert_eq!(title.main().len() % 2, 0);
    }

    #[test]
    fn user_input_resolves_only_the_first_namespace_prefix() {
        let strict = Title::parse("User:Template:Foo", NS_MAIN).expect("strict");
        let lenient = Title::new_from_user_input("User:Template:Foo", NS_MAIN).expect("lenient");
        assert_eq!(lenient, strict);
        assert_eq!(lenient.namespace(), NS_USER);
        assert_eq!(lenient.main(), "Template:Foo");

        assert!(Title::parse("Talk:User:X", NS_MAIN).is_err());
        assert!(Title::new_from_user_input("Talk:User:X", NS_MAIN).is_none());

        let aliased = Title::new_from_user_input("image:a:b.png", NS_MAIN).expect("file");
        assert_eq!(aliased.prefixed_text(), "File:A-b.png");
    }
}
