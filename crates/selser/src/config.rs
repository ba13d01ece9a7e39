use normalize::NormalizeConfig;
use serde::Deserialize;

use crate::error::SelserError;

/// Shell settings. `selective = false` always regenerates the whole page.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SelserConfig {
    pub selective: bool,
    pub normalize: NormalizeConfig,
}

impl Default for SelserConfig {
    fn default() -> Self {
        Self {
            selective: true,
            normalize: NormalizeConfig::default(),
        }
    }
}

impl SelserConfig {
    pub fn full() -> Self {
        Self {
            selective: false,
            ..Self::default()
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self, SelserError> {
        toml::from_str(input).map_err(SelserError::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_settings_nest_under_their_own_table() {
        let config = SelserConfig::from_toml_str(
            "selective = false\n[normalize]\nmark_empty_elements = false\n",
        )
        .expect("valid config");
        assert!(!config.selective);
        assert!(!config.normalize.mark_empty_elements);
        assert!(!config.normalize.rt_test_mode);
    }

    #[test]
    fn empty_input_is_selective() {
        let config = SelserConfig::from_toml_str("").expect("valid config");
        assert_eq!(config, SelserConfig::default());
        assert!(config.selective);
    }

    #[test]
    fn unknown_types_are_rejected() {
        let err = SelserConfig::from_toml_str("selective = \"yes\"").expect_err("bad type");
        assert!(matches!(err, SelserError::Config(_)));
    }
}
