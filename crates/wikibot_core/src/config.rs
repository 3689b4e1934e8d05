use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::page::EditSettings;
use crate::template::{AliasGroup, Hierarchies};
use crate::title::{NamespaceInfo, NamespaceTable};

pub const DEFAULT_CONFIG_PATH: &str = ".wikibot/config.toml";
pub const DEFAULT_EDIT_SUMMARY: &str = "Bot: updating templates";
pub const DEFAULT_PAGES_DIR: &str = "pages";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct BotConfig {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub templates: TemplatesSection,
    #[serde(default)]
    pub edit: EditSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub pages_dir: Option<PathBuf>,
    #[serde(default)]
    pub custom_namespaces: Vec<CustomNamespace>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CustomNamespace {
    pub name: String,
    pub id: i32,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct TemplatesSection {
    /// Template name to argument alias groups, highest priority first.
    #[serde(default)]
    pub hierarchies: BTreeMap<String, Vec<AliasGroup>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct EditSection {
    pub summary: Option<String>,
    #[serde(default)]
    pub minor: bool,
}

impl BotConfig {
    /// Standard namespaces plus the configured custom ones.
    pub fn namespace_table(&self) -> Result<NamespaceTable> {
        let mut table = NamespaceTable::default();
        for namespace in &self.wiki.custom_namespaces {
            if namespace.name.trim().is_empty() {
                bail!("custom namespace {} has an empty name", namespace.id);
            }
            table.insert(NamespaceInfo {
                id: namespace.id,
                name: namespace.name.clone(),
                aliases: namespace.aliases.clone(),
                case_sensitive: namespace.case_sensitive,
            });
        }
        Ok(table)
    }

    /// Alias groups keyed by canonical template name.
    pub fn hierarchies(&self, namespaces: &NamespaceTable) -> Hierarchies {
        let mut hierarchies = Hierarchies::default();
        for (template, groups) in &self.templates.hierarchies {
            hierarchies.insert_in(template, groups.clone(), namespaces);
        }
        hierarchies
    }

    /// Resolve the edit summary: env WIKIBOT_EDIT_SUMMARY > config > DEFAULT_EDIT_SUMMARY.
    pub fn edit_summary(&self) -> String {
        if let Some(value) = env_override("WIKIBOT_EDIT_SUMMARY") {
            return value;
        }
        self.edit
            .summary
            .clone()
            .unwrap_or_else(|| DEFAULT_EDIT_SUMMARY.to_string())
    }

    pub fn edit_settings(&self) -> EditSettings {
        EditSettings {
            summary: self.edit_summary(),
            minor: self.edit.minor,
        }
    }

    /// Resolve the local pages directory: env WIKIBOT_PAGES_DIR > config > DEFAULT_PAGES_DIR.
    pub fn pages_dir(&self) -> PathBuf {
        if let Some(value) = env_override("WIKIBOT_PAGES_DIR") {
            return PathBuf::from(value);
        }
        self.wiki
            .pages_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PAGES_DIR))
    }
}

fn env_override(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Load and parse a BotConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<BotConfig> {
    if !config_path.exists() {
        return Ok(BotConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: BotConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
