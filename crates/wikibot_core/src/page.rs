use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::template::{ParsedTemplate, ReplaceOptions, Template};
use crate::template_scan::ScanOptions;
use crate::title::{NS_MAIN, NamespaceTable, Title};
use crate::wikitext::Wikitext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedPage {
    pub title: Title,
    pub content: String,
    pub base_revision: String,
    pub fetched_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditRequest {
    pub title: Title,
    pub text: String,
    pub summary: String,
    pub minor: bool,
    pub base_revision: String,
}

pub trait PageSource {
    /// Current text of `title`, or `None` when the page does not exist.
    fn fetch(&self, title: &Title) -> Result<Option<FetchedPage>>;
}

pub trait PageSink {
    /// Write the page and return its new revision marker. Fails when the
    /// page changed since `base_revision` was fetched.
    fn save(&mut self, request: &EditRequest) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSettings {
    pub summary: String,
    pub minor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EditOutcome {
    Missing,
    Unchanged,
    Saved {
        revision: String,
        changed_templates: usize,
        text: String,
    },
}

/// Fetch `title`, run `edit` over every template the scan reports and save
/// the page when the text changed.
///
/// Templates are written back last to first so earlier spans stay valid.
/// A template overlapping one that was already rewritten is left alone.
pub fn edit_templates<A, F>(
    api: &mut A,
    title: &Title,
    options: &ScanOptions<'_>,
    settings: &EditSettings,
    mut edit: F,
) -> Result<EditOutcome>
where
    A: PageSource + PageSink,
    F: FnMut(&mut Template),
{
    let Some(page) = api.fetch(title)? else {
        warn!(title = %title, "page does not exist");
        return Ok(EditOutcome::Missing);
    };

    let wikitext = Wikitext::new(page.content.as_str());
    let mut templates = wikitext.templates(options);
    let mut text = page.content.clone();
    let mut rewritten: Vec<(usize, usize)> = Vec::new();
    let mut changed_templates = 0usize;

    for parsed in templates.iter_mut().rev() {
        edit(parsed.template_mut());
        if !parsed.is_modified() {
            continue;
        }
        if overlaps_any(parsed, &rewritten) {
            warn!(
                title = %title,
                template = %parsed.template().clean_name(),
                "skipping edit overlapping a rewritten template"
            );
            continue;
        }
        let updated = parsed.replace_in(&text, &ReplaceOptions::default());
        if updated != text {
            changed_templates += 1;
            rewritten.push((parsed.start(), parsed.end()));
            text = updated;
        }
    }

    if text == page.content {
        return Ok(EditOutcome::Unchanged);
    }

    let request = EditRequest {
        title: page.title.clone(),
        text,
        summary: settings.summary.clone(),
        minor: settings.minor,
        base_revision: page.base_revision.clone(),
    };
    let revision = api.save(&request)?;
    info!(
        title = %title,
        revision = %revision,
        changed_templates,
        "saved page"
    );
    Ok(EditOutcome::Saved {
        revision,
        changed_templates,
        text: request.text,
    })
}

fn overlaps_any(parsed: &ParsedTemplate, ranges: &[(usize, usize)]) -> bool {
    ranges
        .iter()
        .any(|(start, end)| parsed.start() < *end && *start < parsed.end())
}

/// Pages stored as `<root>/<Namespace>/<Title>.wiki` files.
#[derive(Debug, Clone)]
pub struct LocalPages {
    root: PathBuf,
    namespaces: NamespaceTable,
}

impl LocalPages {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_namespaces(root, NamespaceTable::default())
    }

    pub fn with_namespaces(root: impl Into<PathBuf>, namespaces: NamespaceTable) -> Self {
        Self {
            root: root.into(),
            namespaces,
        }
    }

    pub fn path_for(&self, title: &Title) -> PathBuf {
        let folder = match title.namespace() {
            NS_MAIN => "Main".to_string(),
            id => self
                .namespaces
                .name_of(id)
                .map_or_else(|| format!("ns{id}"), str::to_string),
        };
        let file = format!("{}.wiki", title.main().replace('/', "___").replace(':', "--"));
        self.root.join(folder).join(file)
    }

    fn read(&self, title: &Title) -> Result<Option<String>> {
        let path = self.path_for(title);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))
            .map(Some)
    }
}

impl PageSource for LocalPages {
    fn fetch(&self, title: &Title) -> Result<Option<FetchedPage>> {
        let Some(content) = self.read(title)? else {
            return Ok(None);
        };
        Ok(Some(FetchedPage {
            title: title.clone(),
            base_revision: compute_revision(&content),
            fetched_at: unix_timestamp()?,
            content,
        }))
    }
}

impl PageSink for LocalPages {
    fn save(&mut self, request: &EditRequest) -> Result<String> {
        let current = self.read(&request.title)?;
        let current_revision = current.as_deref().map(compute_revision).unwrap_or_default();
        if current_revision != request.base_revision {
            bail!(
                "edit conflict on {}: base revision {} but page is at {}",
                request.title,
                request.base_revision,
                if current_revision.is_empty() {
                    "<missing>"
                } else {
                    current_revision.as_str()
                }
            );
        }

        let path = self.path_for(&request.title);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, &request.text)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(compute_revision(&request.text))
    }
}

fn compute_revision(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut output = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn unix_timestamp() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before UNIX_EPOCH")
        .map(|duration| duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::NS_TEMPLATE;
    use tempfile::tempdir;

    fn settings() -> EditSettings {
        EditSettings {
            summary: "test edit".to_string(),
            minor: true,
        }
    }

    fn seed(pages: &LocalPages, title: &Title, content: &str) {
        let path = pages.path_for(title);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write page");
    }

    #[test]
    fn paths_are_grouped_by_namespace() {
        let pages = LocalPages::new("/pages");
        let title = Title::parse("Foo/bar", NS_MAIN).expect("title");
        assert_eq!(pages.path_for(&title), PathBuf::from("/pages/Main/Foo___bar.wiki"));
        let title = Title::parse("Infobox person", NS_TEMPLATE).expect("title");
        assert_eq!(
            pages.path_for(&title),
            PathBuf::from("/pages/Template/Infobox_person.wiki")
        );
    }

    #[test]
    fn missing_page_reports_missing() {
        let temp = tempdir().expect("tempdir");
        let mut pages = LocalPages::new(temp.path());
        let title = Title::parse("Nowhere", NS_MAIN).expect("title");
        let outcome = edit_templates(
            &mut pages,
            &title,
            &ScanOptions::default(),
            &settings(),
            |_| {},
        )
        .expect("edit");
        assert_eq!(outcome, EditOutcome::Missing);
    }

    #[test]
    fn edits_are_saved_only_when_text_changes() {
        let temp = tempdir().expect("tempdir");
        let mut pages = LocalPages::new(temp.path());
        let title = Title::parse("Bob", NS_MAIN).expect("title");
        seed(&pages, &title, "{{User link|bob}} and {{Other|x}}\n{{User link|1=amy}}");

        let options = ScanOptions::default().with_names(&["User link"]);
        let outcome = edit_templates(&mut pages, &title, &options, &settings(), |_| {})
            .expect("noop edit");
        assert_eq!(outcome, EditOutcome::Unchanged);

        let outcome = edit_templates(&mut pages, &title, &options, &settings(), |template| {
            template.set_argument("1", "carol");
        })
        .expect("edit");
        let EditOutcome::Saved {
            changed_templates,
            text,
            ..
        } = outcome
        else {
            panic!("expected a save, got {outcome:?}");
        };
        assert_eq!(changed_templates, 2);
        assert_eq!(text, "{{User link|carol}} and {{Other|x}}\n{{User link|1=carol}}");
        assert_eq!(
            fs::read_to_string(pages.path_for(&title)).expect("read back"),
            text
        );
    }

    #[test]
    fn nested_edits_inside_rewritten_templates_are_skipped() {
        let temp = tempdir().expect("tempdir");
        let mut pages = LocalPages::new(temp.path());
        let title = Title::parse("Nest", NS_MAIN).expect("title");
        seed(&pages, &title, "{{A|{{A|in}}}}");

        let outcome = edit_templates(
            &mut pages,
            &title,
            &ScanOptions::default(),
            &settings(),
            |template| template.set_argument("flag", "yes"),
        )
        .expect("edit");
        let EditOutcome::Saved {
            changed_templates,
            text,
            ..
        } = outcome
        else {
            panic!("expected a save, got {outcome:?}");
        };
        assert_eq!(changed_templates, 1);
        assert_eq!(text, "{{A|{{A|in|flag=yes}}}}");
    }

    #[test]
    fn stale_base_revision_is_a_conflict() {
        let temp = tempdir().expect("tempdir");
        let mut pages = LocalPages::new(temp.path());
        let title = Title::parse("Race", NS_MAIN).expect("title");
        seed(&pages, &title, "old");
        let fetched = pages.fetch(&title).expect("fetch").expect("page exists");
        seed(&pages, &title, "changed elsewhere");

        let request = EditRequest {
            title: title.clone(),
            text: "mine".to_string(),
            summary: "s".to_string(),
            minor: false,
            base_revision: fetched.base_revision,
        };
        let error = pages.save(&request).expect_err("conflict");
        assert!(error.to_string().contains("edit conflict"));
        assert_eq!(
            fs::read_to_string(pages.path_for(&title)).expect("read"),
            "changed elsewhere"
        );
    }

    #[test]
    fn revision_markers_follow_content() {
        assert_eq!(compute_revision("a"), compute_revision("a"));
        assert_ne!(compute_revision("a"), compute_revision("b"));
        assert_eq!(compute_revision("a").len(), 16);
    }
}
