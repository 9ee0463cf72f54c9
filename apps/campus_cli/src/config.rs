use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "campus.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub data_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".into(),
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("campus"),
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    data_dir: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then `config_path` if it exists, then the environment.
pub fn load_settings(config_path: &Path) -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string(config_path) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<FileSettings>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!(%err, "config: ignoring unreadable settings file");
            return;
        }
    };
    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file_cfg.data_dir {
        settings.data_dir = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("CAMPUS_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = lookup("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = lookup("CAMPUS_DATA_DIR") {
        settings.data_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup("APP__DATA_DIR") {
        settings.data_dir = PathBuf::from(v);
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
}

/// Checks that `raw` is an absolute http(s) URL and strips trailing slashes.
pub fn normalize_api_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).with_context(|| format!("invalid api url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("api url '{raw}' must use http or https");
    }
    Ok(trimmed.to_string())
}

pub fn prepare_data_dir(data_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(data_dir).with_context(|| {
        format!(
            "failed to create data directory '{}'",
            data_dir.display()
        )
    })?;
    Ok(data_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    #[test]
    fn file_then_env_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "api_url = \"http://lms.test/api\"\nrequest_timeout_secs = 5\n",
        );
        assert_eq!(settings.api_url, "http://lms.test/api");
        assert_eq!(settings.request_timeout_secs, 5);

        let env: HashMap<&str, &str> = HashMap::from([
            ("CAMPUS_API_URL", "http://campus.test/api"),
            ("APP__API_URL", "http://app.test/api"),
            ("APP__REQUEST_TIMEOUT_SECS", "not a number"),
        ]);
        apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string()));
        assert_eq!(settings.api_url, "http://app.test/api");
        assert_eq!(settings.request_timeout_secs, 5);
    }

    #[test]
    fn broken_settings_file_is_ignored() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "api_url = [");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn api_url_must_be_http() {
        assert_eq!(
            normalize_api_url(" http://localhost:5000/api/ ").expect("valid"),
            "http://localhost:5000/api"
        );
        assert!(normalize_api_url("ftp://host/api").is_err());
        assert!(normalize_api_url("localhost:5000").is_err());
    }

    #[test]
    fn creates_nested_data_dir() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let temp_root = env::temp_dir().join(format!("campus_cli_test_{suffix}"));
        let data_dir = temp_root.join("nested").join("data");

        prepare_data_dir(&data_dir).expect("prepare data dir");
        assert!(data_dir.is_dir());

        fs::remove_dir_all(temp_root).expect("cleanup");
    }
}
