use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::BiosubError;

/// Marker directory that makes a directory tree a submission workspace.
pub const WORKSPACE_DIR: &str = ".biosub";
const CONFIG_FILE: &str = "config.yaml";

/// Workspace settings read from `.biosub/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub submitter_account: String,
    pub submitter_password: String,
    #[serde(default = "default_ftp_host")]
    pub ftp_host: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

pub fn default_ftp_host() -> String {
    "ftp.archive.example.org".to_string()
}

pub fn default_api_url() -> String {
    "https://archive.example.org/submission/v1".to_string()
}

/// A discovered workspace: its root directory plus the parsed settings.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: Utf8PathBuf,
    pub settings: Settings,
}

impl Workspace {
    /// Walk up from `cwd` looking for the workspace marker, then read the
    /// settings file. Missing marker and unreadable settings are both fatal
    /// before any package work starts.
    pub fn discover(cwd: &Utf8Path) -> Result<Self, BiosubError> {
        let root = find_workspace_root(cwd).ok_or(BiosubError::MissingWorkspace)?;
        let settings = load_settings(&root)?;
        Ok(Self { root, settings })
    }

    /// Create the workspace marker and settings file in `dir`. Refuses to
    /// run inside an existing workspace.
    pub fn init(dir: &Utf8Path, settings: &Settings) -> Result<Utf8PathBuf, BiosubError> {
        if find_workspace_root(dir).is_some() {
            return Err(BiosubError::Filesystem(format!(
                "{dir} is already inside a submission workspace"
            )));
        }
        let marker = dir.join(WORKSPACE_DIR);
        fs::create_dir_all(marker.as_std_path())
            .map_err(|err| BiosubError::Filesystem(err.to_string()))?;
        let config_path = marker.join(CONFIG_FILE);
        let content = serde_yaml::to_string(settings)
            .map_err(|err| BiosubError::ConfigParse(err.to_string()))?;
        fs::write(config_path.as_std_path(), content)
            .map_err(|err| BiosubError::Filesystem(err.to_string()))?;
        Ok(dir.to_path_buf())
    }
}

pub fn find_workspace_root(cwd: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut current = Some(cwd);
    while let Some(dir) = current {
        if dir.join(WORKSPACE_DIR).as_std_path().is_dir() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

fn load_settings(root: &Utf8Path) -> Result<Settings, BiosubError> {
    let config_path = root.join(WORKSPACE_DIR).join(CONFIG_FILE);
    let content = fs::read_to_string(config_path.as_std_path())
        .map_err(|_| BiosubError::ConfigRead(config_path.clone().into_std_path_buf()))?;
    serde_yaml::from_str(&content).map_err(|err| BiosubError::ConfigParse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, path)
    }

    #[test]
    fn init_then_discover_from_nested_dir() {
        let (_temp, root) = temp_root();
        let settings = Settings {
            submitter_account: "submitter-a".to_string(),
            submitter_password: "secret".to_string(),
            ftp_host: default_ftp_host(),
            api_url: default_api_url(),
        };
        Workspace::init(&root, &settings).unwrap();

        let nested = root.join("BAM.project-x").join("SAMP01");
        fs::create_dir_all(nested.as_std_path()).unwrap();

        let workspace = Workspace::discover(&nested).unwrap();
        assert_eq!(workspace.root, root);
        assert_eq!(workspace.settings.submitter_account, "submitter-a");
        assert_eq!(workspace.settings.ftp_host, default_ftp_host());
    }

    #[test]
    fn discover_outside_workspace_fails() {
        let (_temp, root) = temp_root();
        let err = Workspace::discover(&root).unwrap_err();
        assert_matches!(err, BiosubError::MissingWorkspace);
    }

    #[test]
    fn settings_defaults_fill_missing_fields() {
        let settings: Settings = serde_yaml::from_str(
            "submitter_account: acc\nsubmitter_password: pw\n",
        )
        .unwrap();
        assert_eq!(settings.api_url, default_api_url());
        assert_eq!(settings.ftp_host, default_ftp_host());
    }
}
