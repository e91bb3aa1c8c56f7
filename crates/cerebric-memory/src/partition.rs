//! Fixed memory partitions. `Core` and the default administrative profile
//! are never purgeable.

use std::fmt;

pub const DEFAULT_ADMIN_PROFILE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Protected; never purgeable.
    Core,
    /// Action outcomes, anomalies, confidence histories.
    Runtime,
    /// User profile data.
    Shared,
    /// Isolated per-profile data; the default administrative profile is
    /// also protected.
    Profile(String),
}

impl Partition {
    pub fn is_protected(&self) -> bool {
        match self {
            Partition::Core => true,
            Partition::Profile(name) => name == DEFAULT_ADMIN_PROFILE,
            Partition::Runtime | Partition::Shared => false,
        }
    }

    pub fn dir_name(&self) -> String {
        match self {
            Partition::Core => "core".to_string(),
            Partition::Runtime => "runtime".to_string(),
            Partition::Shared => "shared".to_string(),
            Partition::Profile(name) => format!("profiles/{name}"),
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_is_protected() {
        assert!(Partition::Core.is_protected());
    }

    #[test]
    fn test_default_admin_profile_is_protected() {
        assert!(Partition::Profile(DEFAULT_ADMIN_PROFILE.to_string()).is_protected());
    }

    #[test]
    fn test_other_profile_is_not_protected() {
        assert!(!Partition::Profile("scratch".to_string()).is_protected());
    }

    #[test]
    fn test_runtime_and_shared_not_protected() {
        assert!(!Partition::Runtime.is_protected());
        assert!(!Partition::Shared.is_protected());
    }
}
