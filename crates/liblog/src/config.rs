// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process configuration, read once from the environment.
//!
//! | variable | meaning | default |
//! |----------|---------|---------|
//! | `LOGD_SOCKET` | daemon writer socket | `/dev/socket/logdw` |
//! | `LOG_FILE_LOGGER_PATH` | file that replaces the daemon as the text sink | unset |
//! | `LOG_SECURITY` | security buffer writes enabled | `false` |
//! | `LOG_TAG`, `LOG_TAG_<tag>` | global and per-tag levels | unset |

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::constants::LOGDW_SOCKET_PATH;
use crate::properties::TagLevels;

pub const SOCKET_PATH_VAR: &str = "LOGD_SOCKET";
pub const FILE_LOGGER_PATH_VAR: &str = "LOG_FILE_LOGGER_PATH";
pub const SECURITY_VAR: &str = "LOG_SECURITY";

#[derive(Debug, Clone)]
pub struct LiblogConfig {
    pub socket_path: PathBuf,
    pub file_logger_path: Option<PathBuf>,
    pub security_enabled: bool,
    pub tag_levels: TagLevels,
}

impl Default for LiblogConfig {
    fn default() -> Self {
        LiblogConfig {
            socket_path: PathBuf::from(LOGDW_SOCKET_PATH),
            file_logger_path: None,
            security_enabled: false,
            tag_levels: TagLevels::new(),
        }
    }
}

impl LiblogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let lookup = |name: &str| {
            vars.iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = LiblogConfig::default();
        LiblogConfig {
            socket_path: lookup(SOCKET_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.socket_path),
            file_logger_path: lookup(FILE_LOGGER_PATH_VAR).map(PathBuf::from),
            security_enabled: lookup(SECURITY_VAR)
                .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.security_enabled),
            tag_levels: TagLevels::from_vars(vars.iter().cloned()),
        }
    }
}

/// Configuration of this process, read on first use.
pub fn config() -> &'static LiblogConfig {
    static CONFIG: OnceLock<LiblogConfig> = OnceLock::new();
    CONFIG.get_or_init(LiblogConfig::from_env)
}
