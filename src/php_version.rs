//! Target PHP version.
//!
//! The stub corpus annotates version-dependent declarations with
//! `#[PhpStormStubsElementAvailable]` and `#[LanguageLevelTypeAware]`; the
//! resolver keeps only what applies to the configured target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// A `major.minor` PHP version.  Ordering is numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhpVersion {
    pub major: u8,
    pub minor: u8,
}

impl PhpVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        PhpVersion { major, minor }
    }

    /// Whether this version falls inside `from..=to`, either end open.
    pub fn within(self, from: Option<PhpVersion>, to: Option<PhpVersion>) -> bool {
        from.is_none_or(|f| self >= f) && to.is_none_or(|t| self <= t)
    }
}

impl Default for PhpVersion {
    fn default() -> Self {
        PhpVersion::new(8, 3)
    }
}

impl fmt::Display for PhpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PhpVersion {
    type Err = Error;

    /// Accepts `8`, `8.1` and `8.1.12` (patch ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidPhpVersion(s.to_string());
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse::<u8>().ok())
            .ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(p) => p.parse::<u8>().map_err(|_| invalid())?,
            None => 0,
        };
        Ok(PhpVersion { major, minor })
    }
}

impl Serialize for PhpVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PhpVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_orders() {
        let v: PhpVersion = "8.1.12".parse().unwrap();
        assert_eq!(v, PhpVersion::new(8, 1));
        assert!(PhpVersion::new(7, 4) < v);
        assert!("eight".parse::<PhpVersion>().is_err());
    }

    #[test]
    fn within_handles_open_ends() {
        let v = PhpVersion::new(8, 0);
        assert!(v.within(None, None));
        assert!(v.within(Some(PhpVersion::new(7, 1)), None));
        assert!(!v.within(None, Some(PhpVersion::new(7, 4))));
    }
}
