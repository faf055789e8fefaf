// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Firmware and application version strings

use core::fmt::Display;

/// `major.minor.patch` version, ordered numerically
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Loosely parse a version from a string such as `2.1.0-rc1` or `v1.4`
    ///
    /// The first run of digits starts the version, missing components are zero.
    pub fn coerce(s: &str) -> Option<Self> {
        let start = s.find(|c: char| c.is_ascii_digit())?;

        let mut parts = [0u32; 3];
        let mut n = 0;

        for p in s[start..].split('.') {
            let digits: String = p.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                break;
            }

            parts[n] = digits.parse().ok()?;
            n += 1;

            // Stop at suffixes (`-osu`, `-rc1`) or once complete
            if n == 3 || digits.len() != p.len() {
                break;
            }
        }

        Some(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl Display for FirmwareVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn coerce_versions() {
        let tests = &[
            ("2.2.3", Some(FirmwareVersion::new(2, 2, 3))),
            ("1.1", Some(FirmwareVersion::new(1, 1, 0))),
            ("v1.4.0", Some(FirmwareVersion::new(1, 4, 0))),
            ("2.1.0-osu", Some(FirmwareVersion::new(2, 1, 0))),
            ("1.16", Some(FirmwareVersion::new(1, 16, 0))),
            ("", None),
            ("latest", None),
        ];

        for (s, v) in tests {
            assert_eq!(&FirmwareVersion::coerce(s), v, "version: {s}");
        }
    }

    #[test]
    fn ordering() {
        assert!(FirmwareVersion::new(2, 0, 0) > FirmwareVersion::new(1, 16, 0));
        assert!(FirmwareVersion::new(1, 1, 2) > FirmwareVersion::new(1, 1, 1));
        assert_eq!(FirmwareVersion::new(1, 0, 1).to_string(), "1.0.1");
    }
}
