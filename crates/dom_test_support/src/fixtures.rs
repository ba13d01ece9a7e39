//! TOML fixture corpora.
//!
//! A corpus file looks like
//!
//! ```toml
//! format = "wikidom-fixtures-v1"
//!
//! [[cases]]
//! id = "li-hack"
//! source = "*\n*foo"
//! input = "<ul>...</ul>"
//! expected = "<ul>...</ul>"
//! ```
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub const FIXTURE_FORMAT_V1: &str = "wikidom-fixtures-v1";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct FixtureFile {
    pub format: String,
    pub cases: Vec<FixtureCase>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct FixtureCase {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Original wikitext the input's offsets point into.
    #[serde(default)]
    pub source: Option<String>,
    pub input: String,
    pub expected: String,
    /// Inline `NormalizeConfig` overrides in TOML form.
    #[serde(default)]
    pub config: Option<String>,
}

pub fn parse_fixture_file(content: &str, origin: &str) -> FixtureFile {
    let file: FixtureFile = toml::from_str(content)
        .unwrap_or_else(|err| panic!("failed to parse fixture TOML {origin}: {err}"));
    assert_eq!(
        file.format, FIXTURE_FORMAT_V1,
        "unsupported fixture format in {origin}"
    );
    let mut seen = BTreeSet::new();
    for case in &file.cases {
        assert!(
            seen.insert(case.id.as_str()),
            "duplicate fixture id in {origin}: {}",
            case.id
        );
    }
    file
}

pub fn load_fixture_file(path: &Path) -> FixtureFile {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read fixture TOML {path:?}: {err}"));
    parse_fixture_file(&content, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cases_with_optional_fields() {
        let file = parse_fixture_file(
            r#"
format = "wikidom-fixtures-v1"

[[cases]]
id = "a"
input = "<p>x</p>"
expected = "<p>x</p>"

[[cases]]
id = "b"
source = "x"
input = ""
expected = ""
config = "rt_test_mode = true"
"#,
            "inline",
        );
        assert_eq!(file.cases.len(), 2);
        assert_eq!(file.cases[1].source.as_deref(), Some("x"));
        assert_eq!(file.cases[1].config.as_deref(), Some("rt_test_mode = true"));
    }

    #[test]
    #[should_panic(expected = "duplicate fixture id")]
    fn duplicate_ids_are_rejected() {
        parse_fixture_file(
            r#"
format = "wikidom-fixtures-v1"
[[cases]]
id = "a"
input = ""
expected = ""
[[cases]]
id = "a"
input = ""
expected = ""
"#,
            "inline",
        );
    }
}
