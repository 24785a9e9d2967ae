use std::{fs, io::ErrorKind, path::Path, time::Duration};

use anyhow::{bail, Context};
use client_core::ControllerSettings;
use serde::Deserialize;
use tracing::warn;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Rows per page in the rendered table.
    pub page_size: usize,
    pub max_concurrent_calls: u32,
    pub status_poll_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".into(),
            request_timeout_secs: 30,
            page_size: 15,
            max_concurrent_calls: 3,
            status_poll_secs: 5,
        }
    }
}

/// Shape of `dashboard.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    page_size: Option<usize>,
    max_concurrent_calls: Option<u32>,
    status_poll_secs: Option<u64>,
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_secs.max(1))
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            display_page_size: self.page_size,
            max_concurrent_calls: self.max_concurrent_calls,
            ..ControllerSettings::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.api_base_url)
            .with_context(|| format!("invalid api_base_url '{}'", self.api_base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("api_base_url must use http or https: {}", self.api_base_url);
        }
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        if self.max_concurrent_calls == 0 {
            bail!("max_concurrent_calls must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(v) = file.api_base_url {
            self.api_base_url = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file.page_size {
            self.page_size = v;
        }
        if let Some(v) = file.max_concurrent_calls {
            self.max_concurrent_calls = v;
        }
        if let Some(v) = file.status_poll_secs {
            self.status_poll_secs = v;
        }
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("LEADS_API_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = env("APP__API_BASE_URL") {
            self.api_base_url = v;
        }
        parse_env(&env, "APP__REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs);
        parse_env(&env, "APP__PAGE_SIZE", &mut self.page_size);
        parse_env(&env, "APP__MAX_CONCURRENT_CALLS", &mut self.max_concurrent_calls);
        parse_env(&env, "APP__STATUS_POLL_SECS", &mut self.status_poll_secs);
    }
}

fn parse_env<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    let Some(raw) = env(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(key, value = %raw, "config: ignoring unparsable override"),
    }
}

/// Defaults, then `path` if it exists, then process environment.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

pub fn load_settings_with(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            settings.apply_file(file);
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    }

    settings.apply_env(env);
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
