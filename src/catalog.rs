use std::collections::BTreeMap;

use tracing::debug;

use crate::api::ArchiveApi;
use crate::domain::{Code, EnumValue};
use crate::error::BiosubError;

/// Every coded-value category the archive defines. Fetched in one pass so a
/// batch either has the full catalog or none of it.
pub const CATEGORIES: [&str; 13] = [
    "genders",
    "case_control",
    "instrument_models",
    "library_sources",
    "library_selections",
    "library_strategies",
    "library_layouts",
    "file_types",
    "reference_genomes",
    "experiment_types",
    "reference_chromosomes",
    "study_types",
    "dataset_types",
];

/// Immutable snapshot of the archive's coded-value sets, fetched once per
/// run and passed explicitly to every validation call.
#[derive(Debug, Clone, Default)]
pub struct EnumCatalog {
    categories: BTreeMap<String, Vec<EnumValue>>,
}

impl EnumCatalog {
    /// Pull all categories from the archive. Any failure makes the whole
    /// catalog unavailable, which callers treat as fatal for the batch.
    pub fn fetch(api: &dyn ArchiveApi) -> Result<Self, BiosubError> {
        let mut categories = BTreeMap::new();
        for category in CATEGORIES {
            let values = api.fetch_enums(category)?;
            debug!(category, count = values.len(), "fetched enum category");
            categories.insert(category.to_string(), values);
        }
        Ok(Self { categories })
    }

    /// Build a catalog from literal categories, used by tests.
    pub fn from_categories<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<EnumValue>)>,
        S: Into<String>,
    {
        Self {
            categories: entries
                .into_iter()
                .map(|(name, values)| (name.into(), values))
                .collect(),
        }
    }

    /// Cached values of one category, empty for unknown category names.
    pub fn lookup(&self, category: &str) -> &[EnumValue] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// True when the category has an entry whose tag equals the code's
    /// string form.
    pub fn contains_tag(&self, category: &str, code: &Code) -> bool {
        self.lookup(category)
            .iter()
            .any(|entry| entry.tag == code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enum_value(tag: &str, value: &str) -> EnumValue {
        EnumValue {
            tag: tag.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn lookup_returns_cached_values_in_order() {
        let catalog = EnumCatalog::from_categories([(
            "genders",
            vec![enum_value("1", "male"), enum_value("2", "female")],
        )]);
        let genders = catalog.lookup("genders");
        assert_eq!(genders.len(), 2);
        assert_eq!(genders[0].tag, "1");
        assert_eq!(genders[1].value, "female");
    }

    #[test]
    fn lookup_unknown_category_is_empty() {
        let catalog = EnumCatalog::default();
        assert!(catalog.lookup("genders").is_empty());
    }

    #[test]
    fn contains_tag_compares_string_form() {
        let catalog =
            EnumCatalog::from_categories([("genders", vec![enum_value("1", "male")])]);
        assert!(catalog.contains_tag("genders", &Code::from("1")));
        assert!(!catalog.contains_tag("genders", &Code::from("9")));
    }
}
