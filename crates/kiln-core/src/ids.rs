//! Strongly-typed identifiers for domain entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let uuid_str = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }
    };
}

define_id!(BuildId, "bld");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_id_display() {
        let id = BuildId::new();
        assert!(id.to_string().starts_with("bld_"));
    }

    #[test]
    fn test_build_id_parse_with_and_without_prefix() {
        let id = BuildId::new();
        let prefixed: BuildId = id.to_string().parse().unwrap();
        let bare: BuildId = id.as_uuid().to_string().parse().unwrap();
        assert_eq!(id, prefixed);
        assert_eq!(id, bare);
    }

    #[test]
    fn test_build_ids_are_unique() {
        assert_ne!(BuildId::new(), BuildId::new());
    }

    #[test]
    fn test_build_id_rejects_garbage() {
        assert!("bld_not-a-uuid".parse::<BuildId>().is_err());
    }
}
