//! Minimal shared-config profile reader
//!
//! Parses the INI-style shared configuration format far enough to look up
//! per-profile properties such as `retry_mode`. Sections are either
//! `[default]` or `[profile name]` (the bare `[name]` spelling is accepted
//! too); properties are `key = value` lines; `#` and `;` start comments.

use std::collections::HashMap;
use std::path::Path;

use super::ConfigError;

/// An in-memory view of a shared configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSet {
    profiles: HashMap<String, HashMap<String, String>>,
}

impl ProfileSet {
    /// An empty profile set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load and parse the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| ConfigError::ProfileIo {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::parse(&contents)
    }

    /// Parse profile file contents.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut profiles: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current: Option<String> = None;

        for (index, raw_line) in contents.lines().enumerate() {
            let line_number = index + 1;
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(section) = line.strip_prefix('[') {
                let section =
                    section.strip_suffix(']').ok_or_else(|| ConfigError::MalformedProfile {
                        line: line_number,
                        message: "unterminated section header".to_string(),
                    })?;
                let name = section.trim().strip_prefix("profile ").unwrap_or(section).trim();
                if name.is_empty() {
                    return Err(ConfigError::MalformedProfile {
                        line: line_number,
                        message: "empty profile name".to_string(),
                    });
                }
                profiles.entry(name.to_string()).or_default();
                current = Some(name.to_string());
                continue;
            }

            let (key, value) =
                line.split_once('=').ok_or_else(|| ConfigError::MalformedProfile {
                    line: line_number,
                    message: "expected `key = value`".to_string(),
                })?;
            let profile = current.as_ref().ok_or_else(|| ConfigError::MalformedProfile {
                line: line_number,
                message: "property outside of a profile section".to_string(),
            })?;

            profiles
                .entry(profile.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }

        Ok(Self { profiles })
    }

    /// Value of `property` in `profile`, when both exist.
    pub fn property(&self, profile: &str, property: &str) -> Option<&str> {
        self.profiles.get(profile)?.get(property).map(String::as_str)
    }

    /// Whether the set contains `profile`.
    pub fn has_profile(&self, profile: &str) -> bool {
        self.profiles.contains_key(profile)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(['#', ';']) {
        Some(index) => &line[..index],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for config::profiles.
    use super::*;

    /// Validates `ProfileSet::parse` behavior for the basic file scenario.
    ///
    /// Assertions:
    /// - Confirms properties resolve per profile.
    /// - Ensures the `[profile name]` spelling maps to the bare name.
    #[test]
    fn test_parse_basic_file() {
        let set = ProfileSet::parse(
            "[default]\nretry_mode = standard\n\n[profile tooling]\nretry_mode = legacy\n",
        )
        .unwrap();

        assert_eq!(set.property("default", "retry_mode"), Some("standard"));
        assert_eq!(set.property("tooling", "retry_mode"), Some("legacy"));
        assert_eq!(set.property("missing", "retry_mode"), None);
    }

    /// Validates comment and whitespace handling.
    #[test]
    fn test_parse_comments_and_whitespace() {
        let set = ProfileSet::parse(
            "# shared config\n[default]  \n  retry_mode =  standard  ; inline note\n",
        )
        .unwrap();

        assert_eq!(set.property("default", "retry_mode"), Some("standard"));
    }

    /// Validates `ProfileSet::parse` behavior for malformed input.
    ///
    /// Assertions:
    /// - Ensures a property before any section is rejected.
    /// - Ensures an unterminated section header is rejected with its line.
    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(matches!(
            ProfileSet::parse("retry_mode = legacy\n"),
            Err(ConfigError::MalformedProfile { line: 1, .. })
        ));

        assert!(matches!(
            ProfileSet::parse("[default\nretry_mode = legacy\n"),
            Err(ConfigError::MalformedProfile { line: 1, .. })
        ));
    }

    /// Validates that a section with no properties still registers.
    #[test]
    fn test_empty_profile_is_known() {
        let set = ProfileSet::parse("[default]\n").unwrap();

        assert!(set.has_profile("default"));
        assert_eq!(set.property("default", "retry_mode"), None);
    }
}
