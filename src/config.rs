use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_SERVICE_URL;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_service_url")]
    pub service_url: String,
    #[serde(default = "default_tick_rate")]
    pub tick_rate_fps: f64,
    /// `limit` for actor search and follows.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Rows from the tail at which the next page is requested.
    #[serde(default = "default_load_more_threshold")]
    pub load_more_threshold: usize,
    #[serde(default)]
    pub default_view: DefaultView,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultView {
    #[default]
    Timeline,
    Notifications,
    Search,
    Messages,
}

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_tick_rate() -> f64 {
    30.0
}

fn default_page_limit() -> u32 {
    25
}

fn default_load_more_threshold() -> usize {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            tick_rate_fps: default_tick_rate(),
            page_limit: default_page_limit(),
            load_more_threshold: default_load_more_threshold(),
            default_view: DefaultView::default(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/skeetboy/config.toml"))
}

pub fn load_config() -> AppConfig {
    let Some(path) = config_path() else {
        return AppConfig::default();
    };

    let Ok(contents) = fs::read_to_string(&path) else {
        return AppConfig::default();
    };

    parse_config(&contents)
}

fn parse_config(contents: &str) -> AppConfig {
    toml::from_str(contents).unwrap_or_else(|e| {
        tracing::warn!("ignoring invalid config.toml: {e}");
        AppConfig::default()
    })
}
