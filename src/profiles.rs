use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{error::ConfigError, util::clean_profile_name};

/// File name, under `~/.aws`, of the profiles configuration used when none is given.
pub const DEFAULT_CONFIG_FILE: &str = ".python-profiles.conf";
pub const DEFAULT_SECTION: &str = "testProfile";
pub const DEFAULT_KEY: &str = "profile_list";
const DEFAULTS_SECTION: &str = "DEFAULT";

/// Where the profiles for a run come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfileSource {
    /// Profile names supplied by the caller.
    Explicit(Vec<String>),
    /// A whitespace-separated list stored under `key` in `[section]` of an INI-style file.
    ConfigFile { path: PathBuf, section: String, key: String },
}

impl ProfileSource {
    pub fn config_file(path: impl Into<PathBuf>) -> Self {
        ProfileSource::ConfigFile {
            path: path.into(),
            section: DEFAULT_SECTION.to_string(),
            key: DEFAULT_KEY.to_string(),
        }
    }

    /// Produce the ordered profile names for the run.
    pub fn resolve(&self) -> Result<Vec<String>, ConfigError> {
        let (profiles, source_name) = match self {
            ProfileSource::Explicit(names) => (
                names.iter().map(|n| clean_profile_name(n)).filter(|n| !n.is_empty()).collect(),
                "the command line".to_string(),
            ),
            ProfileSource::ConfigFile { path, section, key } => (
                read_profile_list(path, section, key)?,
                format!("[{section}] {key} of {}", path.display()),
            ),
        };

        if profiles.is_empty() {
            return Err(ConfigError::EmptyProfileList { source_name });
        }
        debug!("Resolved profiles from {source_name}: {}", profiles.join(", "));
        Ok(profiles)
    }
}

fn read_profile_list(path: &Path, section: &str, key: &str) -> Result<Vec<String>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ConfigError::Missing { path: path.to_path_buf() },
        _ => ConfigError::Read { path: path.to_path_buf(), source },
    })?;

    let sections = parse_ini(path, &raw)?;
    let values = sections.get(section).ok_or_else(|| ConfigError::MissingSection {
        path: path.to_path_buf(),
        section: section.to_string(),
    })?;

    let key_lower = key.to_ascii_lowercase();
    let value = values
        .get(&key_lower)
        .or_else(|| sections.get(DEFAULTS_SECTION).and_then(|d| d.get(&key_lower)))
        .ok_or_else(|| ConfigError::MissingKey {
            path: path.to_path_buf(),
            section: section.to_string(),
            key: key.to_string(),
        })?;

    Ok(value.split_whitespace().map(clean_profile_name).filter(|p| !p.is_empty()).collect())
}

type Sections = HashMap<String, HashMap<String, String>>;

/// Minimal INI reader: `[section]` headers, `key = value` or `key: value` pairs,
/// `#`/`;` comment lines, and indented continuation lines. Keys are lowercased,
/// section names are kept as written.
///
/// Content before the first header, lines without a separator, empty keys and
/// repeated sections or keys are rejected as [`ConfigError::Malformed`].
fn parse_ini(path: &Path, raw: &str) -> Result<Sections, ConfigError> {
    let malformed = |line: usize, reason: String| ConfigError::Malformed {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut sections = Sections::new();
    let mut current_section: Option<String> = None;
    let mut current_key: Option<String> = None;

    for (index, line) in raw.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            current_key = None;
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let indented = line.starts_with(char::is_whitespace);
        if indented {
            if let (Some(section), Some(key)) = (&current_section, &current_key) {
                if let Some(value) = sections.get_mut(section).and_then(|s| s.get_mut(key)) {
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(trimmed);
                }
                continue;
            }
        }

        if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let name = name.trim().to_string();
            if sections.contains_key(&name) {
                return Err(malformed(line_no, format!("section [{name}] already defined")));
            }
            sections.insert(name.clone(), HashMap::new());
            current_section = Some(name);
            current_key = None;
            continue;
        }

        let Some(section) = &current_section else {
            return Err(malformed(line_no, "entry appears before any [section] header".into()));
        };
        let Some(idx) = trimmed.find(['=', ':']) else {
            return Err(malformed(line_no, format!("expected `key = value`, found `{trimmed}`")));
        };

        let key = trimmed[..idx].trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(malformed(line_no, "entry has an empty key".into()));
        }
        let values = sections.entry(section.clone()).or_default();
        if values.contains_key(&key) {
            return Err(malformed(
                line_no,
                format!("key `{key}` already defined in section [{section}]"),
            ));
        }
        values.insert(key.clone(), trimmed[idx + 1..].trim().to_string());
        current_key = Some(key);
    }

    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("profiles.conf");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn explicit_profiles_are_trimmed() {
        let source = ProfileSource::Explicit(vec![
            "\"acct-a\"".into(),
            "  acct-b ".into(),
            "   ".into(),
        ]);
        assert_eq!(source.resolve().unwrap(), vec!["acct-a", "acct-b"]);
    }

    #[test]
    fn single_quoted_profile_is_cleaned() {
        let source = ProfileSource::Explicit(vec!["'prod'".into()]);
        assert_eq!(source.resolve().unwrap(), vec!["prod"]);
    }

    #[test]
    fn explicit_blank_profiles_are_a_configuration_error() {
        let err = ProfileSource::Explicit(vec![" ".into()]).resolve().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyProfileList { .. }));
    }

    #[test]
    fn reads_profile_list_from_section() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "# profiles to audit\n[other]\nprofile_list = nope\n\n[testProfile]\nprofile_list = \"acct-a\" acct-b  acct-c\n",
        );
        let profiles = ProfileSource::config_file(&path).resolve().unwrap();
        assert_eq!(profiles, vec!["acct-a", "acct-b", "acct-c"]);
    }

    #[test]
    fn supports_colon_separator_continuations_and_case_insensitive_keys() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[audit]\nProfile_List: acct-a\n    acct-b\n\tacct-c\n");
        let source = ProfileSource::ConfigFile {
            path,
            section: "audit".into(),
            key: "profile_list".into(),
        };
        assert_eq!(source.resolve().unwrap(), vec!["acct-a", "acct-b", "acct-c"]);
    }

    #[test]
    fn falls_back_to_default_section_values() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[DEFAULT]\nprofile_list = shared\n[testProfile]\nregion = x\n");
        assert_eq!(ProfileSource::config_file(&path).resolve().unwrap(), vec!["shared"]);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = ProfileSource::config_file(dir.path().join("absent.conf")).resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }

    #[test]
    fn missing_section_and_key_are_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[elsewhere]\nprofile_list = a\n");
        assert!(matches!(
            ProfileSource::config_file(&path).resolve().unwrap_err(),
            ConfigError::MissingSection { ref section, .. } if section == "testProfile"
        ));

        let path = write_config(&dir, "[testProfile]\nprofiles = a\n");
        assert!(matches!(
            ProfileSource::config_file(&path).resolve().unwrap_err(),
            ConfigError::MissingKey { .. }
        ));
    }

    #[test]
    fn empty_list_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[testProfile]\nprofile_list =\n");
        assert!(matches!(
            ProfileSource::config_file(&path).resolve().unwrap_err(),
            ConfigError::EmptyProfileList { .. }
        ));
    }

    fn malformed_line(contents: &str) -> usize {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, contents);
        match ProfileSource::config_file(&path).resolve().unwrap_err() {
            ConfigError::Malformed { line, .. } => line,
            other => panic!("expected a malformed configuration, got {other:?}"),
        }
    }

    #[test]
    fn entry_before_first_section_is_malformed() {
        assert_eq!(malformed_line("profile_list = zzz\n[testProfile]\nprofile_list = a\n"), 1);
    }

    #[test]
    fn line_without_separator_is_malformed() {
        assert_eq!(
            malformed_line("[testProfile]\nprofile_list = acct\n\nthis line is garbage\n"),
            4
        );
    }

    #[test]
    fn empty_key_is_malformed() {
        assert_eq!(malformed_line("[testProfile]\n= acct\n"), 2);
    }

    #[test]
    fn duplicate_section_is_malformed() {
        assert_eq!(
            malformed_line(
                "[testProfile]\nprofile_list = acct\n[testProfile]\nprofile_list = acct ghost\n"
            ),
            3
        );
    }

    #[test]
    fn duplicate_key_is_malformed_regardless_of_case() {
        assert_eq!(malformed_line("[testProfile]\nprofile_list = a\nPROFILE_LIST = b\n"), 3);
    }

    #[test]
    fn malformed_error_names_file_and_line() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[testProfile]\ngarbage\n");
        let err = ProfileSource::config_file(&path).resolve().unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "malformed profiles configuration {}:2: expected `key = value`, found `garbage`",
                path.display()
            )
        );
    }
}
