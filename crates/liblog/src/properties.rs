// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Priority and tag filtering applied before any record is formatted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use tracing::warn;

use crate::priority::Priority;

pub const GLOBAL_LEVEL_VAR: &str = "LOG_TAG";
pub const TAG_LEVEL_PREFIX: &str = "LOG_TAG_";

/// Configured levels: one optional global level and per-tag overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagLevels {
    global: Option<Priority>,
    per_tag: HashMap<String, Priority>,
}

impl TagLevels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_global(mut self, level: Priority) -> Self {
        self.global = Some(level);
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: &str, level: Priority) -> Self {
        self.per_tag.insert(tag.to_string(), level);
        self
    }

    /// Collects `LOG_TAG` and `LOG_TAG_<tag>` entries; unparseable levels are ignored.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut levels = TagLevels::new();
        for (key, value) in vars {
            let target = if key == GLOBAL_LEVEL_VAR {
                None
            } else if let Some(tag) = key.strip_prefix(TAG_LEVEL_PREFIX) {
                Some(tag.to_string())
            } else {
                continue;
            };

            let Some(level) = Priority::from_level(&value) else {
                warn!("Ignoring invalid log level '{}' in {}", value, key);
                continue;
            };
            match target {
                Some(tag) => {
                    levels.per_tag.insert(tag, level);
                }
                None => levels.global = Some(level),
            }
        }
        levels
    }

    /// Level for `tag`: its own override, then the global level.
    #[must_use]
    pub fn level_for(&self, tag: &str) -> Option<Priority> {
        self.per_tag.get(tag).copied().or(self.global)
    }
}

/// Process-wide gate consulted by every text write.
#[derive(Debug)]
pub struct LogFilter {
    minimum: AtomicI32,
    levels: TagLevels,
}

impl LogFilter {
    #[must_use]
    pub fn new(levels: TagLevels) -> Self {
        LogFilter {
            minimum: AtomicI32::new(Priority::Default.as_i32()),
            levels,
        }
    }

    /// Sets the minimum priority and returns the previous one.
    pub fn set_minimum_priority(&self, priority: Priority) -> Priority {
        let previous = self.minimum.swap(priority.as_i32(), Ordering::Relaxed);
        Priority::from_i32(previous).unwrap_or(Priority::Default)
    }

    #[must_use]
    pub fn minimum_priority(&self) -> Priority {
        Priority::from_i32(self.minimum.load(Ordering::Relaxed)).unwrap_or(Priority::Default)
    }

    /// Once a minimum priority is set it alone decides. Otherwise the configured level
    /// for `tag` applies, falling back to `default_level`.
    #[must_use]
    pub fn is_loggable(&self, priority: Priority, tag: &str, default_level: Priority) -> bool {
        let minimum = self.minimum_priority();
        if minimum != Priority::Default {
            return priority >= minimum;
        }
        let level = self.levels.level_for(tag).unwrap_or(default_level);
        priority >= level
    }
}

impl Default for LogFilter {
    fn default() -> Self {
        LogFilter::new(TagLevels::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_filter_passes_verbose() {
        let filter = LogFilter::default();
        assert!(filter.is_loggable(Priority::Verbose, "any", Priority::Verbose));
        assert!(!filter.is_loggable(Priority::Verbose, "any", Priority::Info));
    }

    #[test]
    fn test_minimum_priority_gate() {
        let filter = LogFilter::default();
        assert_eq!(filter.set_minimum_priority(Priority::Warn), Priority::Default);
        assert!(!filter.is_loggable(Priority::Info, "tag", Priority::Verbose));
        assert!(filter.is_loggable(Priority::Warn, "tag", Priority::Verbose));
        assert_eq!(filter.minimum_priority(), Priority::Warn);
    }

    #[test]
    fn test_minimum_priority_applies_over_tag_level() {
        let filter = LogFilter::new(TagLevels::new().with_tag("chatty", Priority::Verbose));
        filter.set_minimum_priority(Priority::Error);
        assert!(!filter.is_loggable(Priority::Warn, "chatty", Priority::Verbose));
    }

    #[test]
    fn test_minimum_priority_overrides_stricter_tag_level() {
        let filter = LogFilter::new(TagLevels::new().with_tag("quiet", Priority::Error));
        assert!(!filter.is_loggable(Priority::Info, "quiet", Priority::Verbose));

        filter.set_minimum_priority(Priority::Verbose);
        assert!(filter.is_loggable(Priority::Info, "quiet", Priority::Verbose));

        filter.set_minimum_priority(Priority::Default);
        assert!(!filter.is_loggable(Priority::Info, "quiet", Priority::Verbose));
    }

    #[test]
    fn test_tag_level_overrides_global() {
        let levels = TagLevels::new()
            .with_global(Priority::Warn)
            .with_tag("chatty", Priority::Debug);
        let filter = LogFilter::new(levels);
        assert!(filter.is_loggable(Priority::Debug, "chatty", Priority::Verbose));
        assert!(!filter.is_loggable(Priority::Info, "other", Priority::Verbose));
    }

    #[test]
    fn test_silent_level_suppresses_fatal() {
        let filter = LogFilter::new(TagLevels::new().with_tag("liblog", Priority::Silent));
        assert!(!filter.is_loggable(Priority::Fatal, "liblog", Priority::Verbose));
    }

    #[test]
    fn test_from_vars() {
        let levels = TagLevels::from_vars(vars(&[
            ("LOG_TAG", "I"),
            ("LOG_TAG_liblog", "S"),
            ("LOG_TAG_bad", "?"),
            ("PATH", "/usr/bin"),
        ]));
        assert_eq!(levels.level_for("liblog"), Some(Priority::Silent));
        assert_eq!(levels.level_for("bad"), Some(Priority::Info));
        assert_eq!(levels.level_for("anything"), Some(Priority::Info));
    }
}
