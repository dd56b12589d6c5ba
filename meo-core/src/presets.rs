//! Direction presets: named prompt templates for REPLACE and TWEAK chunks.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::types::{Category, Chunk};

/// One selectable direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectionPreset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Instruction text sent to the agent. May be empty for free-form
    /// presets that rely on the chunk annotation.
    #[serde(default)]
    pub prompt_template: String,
    pub categories: Vec<Category>,
}

impl DirectionPreset {
    pub fn applies_to(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

/// Instruction used when a preset has no template and the chunk has no
/// annotation.
pub fn default_instructions(category: Category) -> &'static str {
    match category {
        Category::Replace => {
            "Rewrite this passage so it reads better while keeping its meaning. \
             Improve clarity, rhythm and word choice."
        }
        Category::Tweak => {
            "Make small, targeted improvements to this passage. \
             Keep the wording mostly intact and fix only what reads awkwardly."
        }
        Category::Lock => "",
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(rename = "preset", default)]
    presets: Vec<DirectionPreset>,
}

/// The set of presets a project can choose from, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetCatalog {
    presets: Vec<DirectionPreset>,
}

impl PresetCatalog {
    /// # Errors
    ///
    /// Rejects duplicate ids and presets that apply only to LOCK (or to
    /// nothing).
    pub fn new(presets: Vec<DirectionPreset>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for preset in &presets {
            if !seen.insert(preset.id.as_str()) {
                return Err(CatalogError::DuplicateId(preset.id.clone()));
            }
            if !preset.categories.iter().any(|c| c.is_editable()) {
                return Err(CatalogError::NoCategory(preset.id.clone()));
            }
        }
        Ok(Self { presets })
    }

    /// Parses `[[preset]]` tables.
    ///
    /// # Errors
    ///
    /// TOML errors plus everything [`PresetCatalog::new`] rejects.
    pub fn from_toml(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(text)?;
        Self::new(file.presets)
    }

    pub fn get(&self, id: &str) -> Option<&DirectionPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirectionPreset> {
        self.presets.iter()
    }

    pub fn for_category(&self, category: Category) -> Vec<&DirectionPreset> {
        self.presets.iter().filter(|p| p.applies_to(category)).collect()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// The instruction text for `chunk`: its preset's template, or the
    /// category default when that template is blank and the chunk has no
    /// annotation to stand in for it. `None` if the preset is unknown.
    pub fn prompt_for(&self, chunk: &Chunk) -> Option<String> {
        let preset = self.get(chunk.direction_preset_id()?)?;
        let template = preset.prompt_template.trim();
        if !template.is_empty() {
            return Some(template.to_owned());
        }
        if chunk.annotation().is_some() {
            return Some(String::new());
        }
        Some(default_instructions(chunk.category()).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[preset]]
id = "tighter"
name = "Tighter"
description = "Cut the fat"
prompt_template = "Make it shorter."
categories = ["replace"]

[[preset]]
id = "custom"
name = "Custom"
categories = ["replace", "tweak"]
"#;

    #[test]
    fn parses_and_filters_by_category() {
        let catalog = PresetCatalog::from_toml(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.for_category(Category::Tweak).len(), 1);
        assert_eq!(catalog.get("tighter").unwrap().prompt_template, "Make it shorter.");
    }

    #[test]
    fn duplicate_ids_rejected() {
        let doubled = format!("{SAMPLE}{SAMPLE}");
        assert!(matches!(
            PresetCatalog::from_toml(&doubled),
            Err(CatalogError::DuplicateId(id)) if id == "tighter"
        ));
    }

    #[test]
    fn lock_only_preset_rejected() {
        let text = "[[preset]]\nid = \"x\"\nname = \"X\"\ncategories = [\"lock\"]\n";
        assert!(matches!(PresetCatalog::from_toml(text), Err(CatalogError::NoCategory(_))));
    }
}
