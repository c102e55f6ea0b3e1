// ── Camera identity ──
//
// Opaque, immutable identifier assigned when a camera record is created.
// Generated ids look like `cam_<32 hex>`; ids supplied by callers (or
// carried in an imported backup) are kept verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Canonical identifier for a camera record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraId(String);

impl CameraId {
    const PREFIX: &'static str = "cam_";

    /// Mint a fresh, globally unique id.
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id was minted by [`generate`](Self::generate).
    pub fn is_generated(&self) -> bool {
        self.0
            .strip_prefix(Self::PREFIX)
            .is_some_and(|rest| Uuid::try_parse(rest).is_ok())
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CameraId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<String> for CameraId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CameraId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_prefixed() {
        let a = CameraId::generate();
        let b = CameraId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("cam_"));
        assert!(a.is_generated());
    }

    #[test]
    fn caller_supplied_id_is_kept() {
        let id: CameraId = "front-door".parse().unwrap();
        assert_eq!(id.to_string(), "front-door");
        assert!(!id.is_generated());
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = CameraId::from("cam_1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cam_1\"");
    }
}
