use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

pub const CONFIG_FILE: &str = "dashboard.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub viewer_email: Option<String>,
    pub session_cookie: Option<String>,
    pub request_timeout_secs: u64,
    pub search_debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".into(),
            viewer_email: None,
            session_cookie: None,
            request_timeout_secs: 30,
            search_debounce_ms: 400,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        // Zero turns the timeout off.
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    fn apply_file(&mut self, raw: &str) {
        let Ok(file_cfg) = toml::from_str::<FileSettings>(raw) else {
            return;
        };
        if let Some(v) = file_cfg.server_url {
            self.server_url = v;
        }
        if let Some(v) = file_cfg.viewer_email {
            self.viewer_email = Some(v);
        }
        if let Some(v) = file_cfg.session_cookie {
            self.session_cookie = Some(v);
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file_cfg.search_debounce_ms {
            self.search_debounce_ms = v;
        }
    }

    /// `DASHBOARD_*` is read first, so the `APP__*` spelling wins when both are set.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let pick = |plain: &str, nested: &str| var(nested).or_else(|| var(plain));

        if let Some(v) = pick("DASHBOARD_SERVER_URL", "APP__SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = pick("DASHBOARD_VIEWER_EMAIL", "APP__VIEWER_EMAIL") {
            self.viewer_email = Some(v);
        }
        if let Some(v) = pick("DASHBOARD_SESSION_COOKIE", "APP__SESSION_COOKIE") {
            self.session_cookie = Some(v);
        }
        if let Some(v) = pick("DASHBOARD_REQUEST_TIMEOUT_SECS", "APP__REQUEST_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.request_timeout_secs = parsed;
            }
        }
        if let Some(v) = pick("DASHBOARD_SEARCH_DEBOUNCE_MS", "APP__SEARCH_DEBOUNCE_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.search_debounce_ms = parsed;
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    viewer_email: Option<String>,
    session_cookie: Option<String>,
    request_timeout_secs: Option<u64>,
    search_debounce_ms: Option<u64>,
}

pub fn load_settings(config_path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        settings.apply_file(&raw);
    }
    settings.apply_env(|key| std::env::var(key).ok());

    settings
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        settings.apply_file(
            r#"
            server_url = "https://events.example"
            viewer_email = "a@x"
            request_timeout_secs = 5
            "#,
        );

        assert_eq!(settings.server_url, "https://events.example");
        assert_eq!(settings.viewer_email.as_deref(), Some("a@x"));
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(settings.search_debounce(), Duration::from_millis(400));
    }

    #[test]
    fn malformed_file_is_ignored() {
        let mut settings = Settings::default();
        settings.apply_file("server_url = [");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn nested_env_form_wins_over_plain_form() {
        let mut settings = Settings::default();
        settings.apply_env(env_of(&[
            ("DASHBOARD_SERVER_URL", "http://plain"),
            ("APP__SERVER_URL", "http://nested"),
            ("DASHBOARD_SESSION_COOKIE", "session=1"),
            ("DASHBOARD_SEARCH_DEBOUNCE_MS", "not a number"),
        ]));

        assert_eq!(settings.server_url, "http://nested");
        assert_eq!(settings.session_cookie.as_deref(), Some("session=1"));
        assert_eq!(settings.search_debounce_ms, 400);
    }

    #[test]
    fn zero_timeout_disables_it() {
        let mut settings = Settings::default();
        settings.apply_env(env_of(&[("APP__REQUEST_TIMEOUT_SECS", "0")]));
        assert_eq!(settings.request_timeout(), None);
    }

    #[test]
    fn loads_settings_file_from_disk() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("event_dashboard_test_{suffix}.toml"));
        fs::write(&path, "search_debounce_ms = 50\n").expect("write config");

        let settings = load_settings(&path);
        assert_eq!(settings.search_debounce(), Duration::from_millis(50));

        fs::remove_file(path).expect("cleanup");
    }
}
