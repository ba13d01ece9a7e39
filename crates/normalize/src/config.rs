use serde::Deserialize;

use crate::error::NormalizeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResponsiveReferences {
    pub enabled: bool,
    /// Groups with more references than this get the column layout class.
    pub threshold: usize,
}

impl Default for ResponsiveReferences {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 10,
        }
    }
}

/// Knobs for the pass suite. Every field has a default, so a partial TOML
/// table is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Round-trip testing keeps stripped-tag placeholders.
    pub rt_test_mode: bool,
    pub discard_data_parsoid: bool,
    pub store_in_page_bundle: bool,
    /// Report nodes a handler leaves detached.
    pub check_if_attached: bool,
    /// Add `mw-empty-elt` to empty `li`/`tr`/`p` elements.
    pub mark_empty_elements: bool,
    pub responsive_references: ResponsiveReferences,
    pub lint_ignored_table_attrs: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            rt_test_mode: false,
            discard_data_parsoid: false,
            store_in_page_bundle: false,
            check_if_attached: cfg!(debug_assertions),
            mark_empty_elements: true,
            responsive_references: ResponsiveReferences::default(),
            lint_ignored_table_attrs: false,
        }
    }
}

impl NormalizeConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, NormalizeError> {
        toml::from_str(input).map_err(NormalizeError::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tables_fill_in_defaults() {
        let config = NormalizeConfig::from_toml_str(
            "rt_test_mode = true\n[responsive_references]\nthreshold = 3\n",
        )
        .expect("valid config");
        assert!(config.rt_test_mode);
        assert!(config.mark_empty_elements);
        assert!(config.responsive_references.enabled);
        assert_eq!(config.responsive_references.threshold, 3);
    }

    #[test]
    fn type_errors_are_reported() {
        let err = NormalizeConfig::from_toml_str("rt_test_mode = 3").expect_err("bad type");
        assert!(matches!(err, NormalizeError::Config(_)));
    }
}
