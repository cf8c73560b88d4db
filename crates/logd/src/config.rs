// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;

use crate::bug_map::DEFAULT_BUG_MAP_PATHS;
use crate::errors::ConfigError;

pub const DEFAULT_KMSG_PATH: &str = "/dev/kmsg";
pub const DEFAULT_PACKAGES_LIST: &str = "/data/system/packages.list";
pub const DEFAULT_MAX_ENTRIES_PER_BUFFER: usize = 16384;

/// Configuration for the log daemon's ingestion path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogdConfig {
    /// Level of the daemon's own diagnostics (trace, debug, info, warn, error)
    pub log_level: String,
    /// Whether to listen on the netlink audit socket
    pub auditd: bool,
    /// Whether audit messages are stored in the main buffer
    pub auditd_main: bool,
    /// Whether audit messages are stored in the events buffer
    pub auditd_events: bool,
    /// Whether audit messages are mirrored to the kernel log
    pub auditd_dmesg: bool,
    /// Whether the kernel ring buffer is replayed at startup
    pub kernel: bool,
    /// Kernel log device
    pub kmsg_path: PathBuf,
    /// Bug-map files, highest priority first
    pub bug_map_paths: Vec<PathBuf>,
    /// Package list used to name application uids
    pub packages_list: PathBuf,
    /// Entries kept per buffer by the in-memory sink
    pub max_entries_per_buffer: usize,
}

impl Default for LogdConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            auditd: true,
            auditd_main: true,
            auditd_events: true,
            auditd_dmesg: true,
            kernel: true,
            kmsg_path: PathBuf::from(DEFAULT_KMSG_PATH),
            bug_map_paths: DEFAULT_BUG_MAP_PATHS.iter().map(PathBuf::from).collect(),
            packages_list: PathBuf::from(DEFAULT_PACKAGES_LIST),
            max_entries_per_buffer: DEFAULT_MAX_ENTRIES_PER_BUFFER,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|val| match val.to_lowercase().as_str() {
            "false" | "0" | "no" | "off" => false,
            "true" | "1" | "yes" | "on" => true,
            _ => default,
        })
        .unwrap_or(default)
}

impl LogdConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let log_level = env::var("LOGD_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);
        let kmsg_path = env::var("LOGD_KMSG_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.kmsg_path);
        let bug_map_paths = env::var("LOGD_BUG_MAP_PATHS")
            .map(|val| {
                val.split(':')
                    .filter(|path| !path.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or(defaults.bug_map_paths);
        let packages_list = env::var("LOGD_PACKAGES_LIST")
            .map(PathBuf::from)
            .unwrap_or(defaults.packages_list);
        let max_entries_per_buffer = match env::var("LOGD_MAX_ENTRIES_PER_BUFFER") {
            Ok(val) => val.trim().parse::<usize>().map_err(|_| {
                ConfigError::InvalidConfig(format!(
                    "LOGD_MAX_ENTRIES_PER_BUFFER must be a positive integer, got '{}'",
                    val
                ))
            })?,
            Err(_) => defaults.max_entries_per_buffer,
        };

        let config = Self {
            log_level,
            auditd: env_flag("LOGD_AUDITD", defaults.auditd),
            auditd_main: env_flag("LOGD_AUDITD_MAIN", defaults.auditd_main),
            auditd_events: env_flag("LOGD_AUDITD_EVENTS", defaults.auditd_events),
            auditd_dmesg: env_flag("LOGD_AUDITD_DMESG", defaults.auditd_dmesg),
            kernel: env_flag("LOGD_KERNEL", defaults.kernel),
            kmsg_path,
            bug_map_paths,
            packages_list,
            max_entries_per_buffer,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        if self.max_entries_per_buffer == 0 {
            return Err(ConfigError::InvalidConfig(
                "LOGD_MAX_ENTRIES_PER_BUFFER must be greater than 0".to_string(),
            ));
        }

        if self.kmsg_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "LOGD_KMSG_PATH cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 10] = [
        "LOGD_LOG_LEVEL",
        "LOGD_AUDITD",
        "LOGD_AUDITD_MAIN",
        "LOGD_AUDITD_EVENTS",
        "LOGD_AUDITD_DMESG",
        "LOGD_KERNEL",
        "LOGD_KMSG_PATH",
        "LOGD_BUG_MAP_PATHS",
        "LOGD_PACKAGES_LIST",
        "LOGD_MAX_ENTRIES_PER_BUFFER",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = LogdConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bug_map_paths.len(), 3);
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = LogdConfig {
            log_level: "loud".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let config = LogdConfig {
            max_entries_per_buffer: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        assert_eq!(LogdConfig::from_env().unwrap(), LogdConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("LOGD_LOG_LEVEL", "DEBUG");
        env::set_var("LOGD_AUDITD_MAIN", "false");
        env::set_var("LOGD_KERNEL", "0");
        env::set_var("LOGD_BUG_MAP_PATHS", "/a/bug_map::/b/bug_map");
        env::set_var("LOGD_MAX_ENTRIES_PER_BUFFER", "32");

        let config = LogdConfig::from_env().unwrap();
        assert_eq!(config.log_level, "debug");
        assert!(!config.auditd_main);
        assert!(config.auditd_events);
        assert!(!config.kernel);
        assert_eq!(
            config.bug_map_paths,
            vec![PathBuf::from("/a/bug_map"), PathBuf::from("/b/bug_map")]
        );
        assert_eq!(config.max_entries_per_buffer, 32);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_capacity() {
        clear_env();
        env::set_var("LOGD_MAX_ENTRIES_PER_BUFFER", "lots");
        assert!(LogdConfig::from_env().is_err());
        clear_env();
    }
}
