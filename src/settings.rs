use std::fs;
use std::path::Path;

use yaml_rust::{Yaml, YamlLoader};

use super::error::AssignError;

/// Stopping rules for the MSA loop.  Hitting the time or iteration cap is a
/// normal termination with the current iterate.
#[derive(Clone, Debug)]
pub struct MsaSettings {
    /// maximum wall-clock run time, in seconds
    pub max_time_s: f64,
    pub max_iterations: u32,
    /// stop once the average link flow is this close to the target
    pub link_flow_tolerance: f64,
}

impl Default for MsaSettings {
    fn default() -> MsaSettings {
        return MsaSettings {
            max_time_s: 3600.0,
            max_iterations: 100,
            link_flow_tolerance: 1e-3,
        };
    }
}

fn yaml_f64(value: &Yaml) -> Option<f64> {
    return value.as_f64().or_else(|| value.as_i64().map(|vv| vv as f64));
}

impl MsaSettings {
    /// Read overrides from a yaml file; keys that are absent keep their
    /// defaults.
    pub fn from_yaml_file(path: &Path) -> Result<MsaSettings, AssignError> {
        let format_err = |message: String| AssignError::Format {
            path: path.to_path_buf(),
            message,
        };

        let contents = fs::read_to_string(path).map_err(|source| AssignError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let docs = YamlLoader::load_from_str(&contents)
            .map_err(|err| format_err(format!("not valid yaml: {}", err)))?;
        let doc = match docs.first() {
            Some(doc) => doc,
            None => return Err(format_err(String::from("settings file is empty"))),
        };

        let mut settings = MsaSettings::default();
        if !doc["max_time_s"].is_badvalue() {
            settings.max_time_s = yaml_f64(&doc["max_time_s"])
                .ok_or_else(|| format_err(String::from("max_time_s is not a number")))?;
        }
        if !doc["max_iterations"].is_badvalue() {
            let iterations = doc["max_iterations"].as_i64()
                .ok_or_else(|| format_err(String::from("max_iterations is not an integer")))?;
            if iterations < 0 || iterations > u32::MAX as i64 {
                return Err(format_err(format!("max_iterations {} out of range", iterations)));
            }
            settings.max_iterations = iterations as u32;
        }
        if !doc["link_flow_tolerance"].is_badvalue() {
            settings.link_flow_tolerance = yaml_f64(&doc["link_flow_tolerance"])
                .ok_or_else(|| format_err(String::from("link_flow_tolerance is not a number")))?;
        }
        return Ok(settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_settings(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        return (dir, path);
    }

    #[test]
    fn test_defaults() {
        let settings = MsaSettings::default();
        assert_eq!(settings.max_time_s, 3600.0);
        assert_eq!(settings.max_iterations, 100);
        assert_eq!(settings.link_flow_tolerance, 1e-3);
    }

    #[test]
    fn test_partial_override() {
        let (_dir, path) = write_settings("max_iterations: 25\nlink_flow_tolerance: 0.01\n");
        let settings = MsaSettings::from_yaml_file(&path).unwrap();
        assert_eq!(settings.max_iterations, 25);
        assert_eq!(settings.link_flow_tolerance, 0.01);
        // untouched key keeps its default
        assert_eq!(settings.max_time_s, 3600.0);
    }

    #[test]
    fn test_bad_value_is_fatal() {
        let (_dir, path) = write_settings("max_iterations: soon\n");
        assert!(MsaSettings::from_yaml_file(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = MsaSettings::from_yaml_file(Path::new("no/such/settings.yaml"));
        assert!(matches!(result, Err(AssignError::Io { .. })));
    }
}
