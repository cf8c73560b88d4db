// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Severity of a text record, ordered from least to most severe.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Unknown = 0,
    /// Only meaningful as a threshold: "no override set".
    Default = 1,
    Verbose = 2,
    Debug = 3,
    Info = 4,
    Warn = 5,
    Error = 6,
    Fatal = 7,
    Silent = 8,
}

impl Priority {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Priority::Unknown),
            1 => Some(Priority::Default),
            2 => Some(Priority::Verbose),
            3 => Some(Priority::Debug),
            4 => Some(Priority::Info),
            5 => Some(Priority::Warn),
            6 => Some(Priority::Error),
            7 => Some(Priority::Fatal),
            8 => Some(Priority::Silent),
            _ => None,
        }
    }

    /// Parses a level as written in tag configuration: the first character of
    /// `V D I W E F A S` (case-insensitive), `A` meaning fatal.
    #[must_use]
    pub fn from_level(level: &str) -> Option<Self> {
        match level.trim().chars().next()?.to_ascii_uppercase() {
            'V' => Some(Priority::Verbose),
            'D' => Some(Priority::Debug),
            'I' => Some(Priority::Info),
            'W' => Some(Priority::Warn),
            'E' => Some(Priority::Error),
            'F' | 'A' => Some(Priority::Fatal),
            'S' => Some(Priority::Silent),
            _ => None,
        }
    }

    /// Single-letter form used in text output.
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Priority::Unknown | Priority::Default => 'X',
            Priority::Verbose => 'V',
            Priority::Debug => 'D',
            Priority::Info => 'I',
            Priority::Warn => 'W',
            Priority::Error => 'E',
            Priority::Fatal | Priority::Silent => 'F',
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> u8 {
        priority as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Priority::Verbose < Priority::Info);
        assert!(Priority::Warn > Priority::Info);
        assert!(Priority::Silent > Priority::Fatal);
    }

    #[test]
    fn test_from_level() {
        assert_eq!(Priority::from_level("W"), Some(Priority::Warn));
        assert_eq!(Priority::from_level("debug"), Some(Priority::Debug));
        assert_eq!(Priority::from_level("A"), Some(Priority::Fatal));
        assert_eq!(Priority::from_level(" s "), Some(Priority::Silent));
        assert_eq!(Priority::from_level(""), None);
        assert_eq!(Priority::from_level("x"), None);
    }

    #[test]
    fn test_i32_round_trip_bounds() {
        assert_eq!(Priority::from_i32(4), Some(Priority::Info));
        assert_eq!(Priority::from_i32(9), None);
        assert_eq!(Priority::from_i32(-1), None);
    }

    #[test]
    fn test_as_char() {
        let chars: String = [
            Priority::Verbose,
            Priority::Debug,
            Priority::Info,
            Priority::Warn,
            Priority::Error,
            Priority::Fatal,
        ]
        .iter()
        .map(|p| p.as_char())
        .collect();
        assert_eq!(chars, "VDIWEF");
    }
}
