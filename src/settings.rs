use anyhow::{Context, Result};
use ini::Ini;
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const SENTRY_OPT_KEY: &str = "sentry_opt";

/// User preference for uploading diagnostic error reports.
///
/// `Asked` marks that the opt-in prompt has been shown while the user has not
/// opted in yet. It is distinct from `Out` so the prompt is not repeated on
/// every status read.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SentryOpt {
    In,
    #[default]
    Out,
    Asked,
}

impl SentryOpt {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentryOpt::In => "in",
            SentryOpt::Out => "out",
            SentryOpt::Asked => "asked",
        }
    }

    /// Unknown or missing stored values decay to the default.
    fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("in") => SentryOpt::In,
            Some("asked") => SentryOpt::Asked,
            _ => SentryOpt::Out,
        }
    }
}

struct SettingsInner {
    ini: Ini,
    path: PathBuf,
    dirty: bool,
}

/// Durable key/value settings store backed by an INI file.
///
/// Cheap to clone; all clones share one store. Each read/modify/save runs
/// under a single mutex, and the lock is never held across outbound I/O.
#[derive(Clone)]
pub struct Settings {
    inner: Arc<Mutex<SettingsInner>>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let ini = if path.exists() {
            Ini::load_from_file(path)
                .with_context(|| format!("failed to load settings from {path:?}"))?
        } else {
            Ini::new()
        };

        Ok(Settings {
            inner: Arc::new(Mutex::new(SettingsInner {
                ini,
                path: path.to_path_buf(),
                dirty: false,
            })),
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.ini.general_section().get(key).map(str::to_string)
    }

    /// A non-forced set of an identical value leaves the store clean.
    pub fn set(&self, key: &str, value: &str, force: bool) {
        let mut inner = self.inner.lock().unwrap();

        if !force && inner.ini.general_section().get(key) == Some(value) {
            return;
        }

        inner.ini.with_section(None::<String>).set(key, value);
        inner.dirty = true;
    }

    /// Write the file only when dirty, unless forced.
    pub fn save(&self, force: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.dirty && !force {
            return Ok(());
        }

        if let Some(parent) = inner.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create settings directory {parent:?}"))?;
        }

        inner
            .ini
            .write_to_file(&inner.path)
            .with_context(|| format!("failed to write settings to {:?}", inner.path))?;
        inner.dirty = false;

        debug!("settings saved to {:?}", inner.path);
        Ok(())
    }

    pub fn auth_token(&self) -> Option<String> {
        self.get(AUTH_TOKEN_KEY)
    }

    /// Forced set plus forced save in one step. Concurrent verifications may
    /// race here; last writer wins.
    pub fn set_auth_token(&self, token: &str) -> Result<()> {
        self.set(AUTH_TOKEN_KEY, token, true);
        self.save(true)
    }

    pub fn sentry_opt(&self) -> SentryOpt {
        SentryOpt::from_stored(self.get(SENTRY_OPT_KEY).as_deref())
    }

    pub fn set_sentry_opt(&self, opt: SentryOpt) -> Result<()> {
        self.set(SENTRY_OPT_KEY, opt.as_str(), true);
        self.save(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_settings() -> (Settings, TempDir) {
        let dir = TempDir::new().expect("failed to create temp dir");
        let settings =
            Settings::load(&dir.path().join("printbeam.cfg")).expect("failed to load settings");
        (settings, dir)
    }

    #[test]
    fn missing_file_starts_empty() {
        let (settings, _dir) = temp_settings();
        assert_eq!(settings.auth_token(), None);
        assert_eq!(settings.sentry_opt(), SentryOpt::Out);
    }

    #[test]
    fn saved_values_survive_reload() {
        let (settings, dir) = temp_settings();

        settings.set_auth_token("tok-123").unwrap();
        settings.set_sentry_opt(SentryOpt::In).unwrap();

        let reloaded = Settings::load(&dir.path().join("printbeam.cfg")).unwrap();
        assert_eq!(reloaded.auth_token().as_deref(), Some("tok-123"));
        assert_eq!(reloaded.sentry_opt(), SentryOpt::In);
    }

    #[test]
    fn unsaved_set_is_not_persisted() {
        let (settings, dir) = temp_settings();

        settings.set(AUTH_TOKEN_KEY, "tok-abc", true);

        let reloaded = Settings::load(&dir.path().join("printbeam.cfg")).unwrap();
        assert_eq!(reloaded.auth_token(), None);
    }

    #[test]
    fn non_forced_identical_set_does_not_dirty_the_store() {
        let (settings, dir) = temp_settings();
        let path = dir.path().join("printbeam.cfg");

        settings.set("flavor", "marlin", true);
        settings.save(true).unwrap();
        let written = std::fs::metadata(&path).unwrap().modified().unwrap();

        settings.set("flavor", "marlin", false);
        settings.save(false).unwrap();
        let after = std::fs::metadata(&path).unwrap().modified().unwrap();

        assert_eq!(written, after);
    }

    #[test]
    fn unknown_stored_sentry_opt_decays_to_out() {
        let (settings, _dir) = temp_settings();
        settings.set(SENTRY_OPT_KEY, "banana", true);
        assert_eq!(settings.sentry_opt(), SentryOpt::Out);
    }

    #[test]
    fn sentry_opt_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SentryOpt::Asked).unwrap(),
            "\"asked\""
        );
    }
}
