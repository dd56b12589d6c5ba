//! The preset catalog compiled into the binary.

use meo_core::error::CatalogError;
use meo_core::presets::PresetCatalog;

const BUILTIN: &str = include_str!("presets.toml");

/// Parses the built-in catalog.
pub fn builtin() -> Result<PresetCatalog, CatalogError> {
    PresetCatalog::from_toml(BUILTIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meo_core::types::Category;

    fn ids(catalog: &PresetCatalog, category: Category) -> Vec<&str> {
        catalog
            .for_category(category)
            .into_iter()
            .map(|p| p.id.as_str())
            .collect()
    }

    #[test]
    fn builtin_catalog_parses() {
        let catalog = builtin().unwrap();
        assert_eq!(catalog.len(), 10);
        assert_eq!(
            ids(&catalog, Category::Replace),
            ["richer", "tighter", "livelier", "calmer", "elevated", "grounded", "custom"]
        );
        assert_eq!(ids(&catalog, Category::Tweak), ["flow", "precision", "tone", "custom"]);
        assert!(ids(&catalog, Category::Lock).is_empty());
    }

    #[test]
    fn every_preset_but_custom_has_a_template() {
        let catalog = builtin().unwrap();
        for preset in catalog.iter() {
            assert!(!preset.description.is_empty(), "{}", preset.id);
            assert_eq!(preset.prompt_template.is_empty(), preset.id == "custom");
        }
    }
}
