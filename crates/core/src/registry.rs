//! Partition registry.
//!
//! A partition name encodes its class and generation (`appshell-v1`,
//! `tiles-v3`). The [`Deployment`] descriptor fixes the live generation of
//! each class for the lifetime of the process; bumping a generation means
//! starting with a new descriptor, after which the previous generation's
//! partition becomes stale and is swept on activation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The fixed set of partition classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PartitionClass {
    /// HTML, scripts, styles and bundled third-party libraries.
    ApplicationShell,
    /// Map tile imagery.
    TileImagery,
}

impl PartitionClass {
    pub const ALL: [PartitionClass; 2] = [PartitionClass::ApplicationShell, PartitionClass::TileImagery];

    /// Name prefix shared by every generation of this class.
    pub fn prefix(self) -> &'static str {
        match self {
            PartitionClass::ApplicationShell => "appshell",
            PartitionClass::TileImagery => "tiles",
        }
    }

    /// Find the class whose prefix the stored name carries, if any.
    pub fn of_name(name: &str) -> Option<PartitionClass> {
        Self::ALL.into_iter().find(|class| {
            name.strip_prefix(class.prefix())
                .is_some_and(|rest| rest.starts_with('-'))
        })
    }
}

impl fmt::Display for PartitionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A parsed `<prefix>-v<generation>` partition name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionName {
    class: PartitionClass,
    generation: u32,
    name: String,
}

impl PartitionName {
    pub fn new(class: PartitionClass, generation: u32) -> Result<Self, Error> {
        if generation == 0 {
            return Err(Error::InvalidPartition(format!("{}: generation must be at least 1", class.prefix())));
        }
        Ok(Self { class, generation, name: format!("{}-v{generation}", class.prefix()) })
    }

    /// Parse a stored partition name.
    pub fn parse(name: &str) -> Result<Self, Error> {
        let class = PartitionClass::of_name(name)
            .ok_or_else(|| Error::InvalidPartition(format!("{name}: unknown partition class")))?;

        let generation = name[class.prefix().len()..]
            .strip_prefix("-v")
            .and_then(|g| g.parse::<u32>().ok())
            .ok_or_else(|| Error::InvalidPartition(format!("{name}: expected {}-v<generation>", class.prefix())))?;

        Self::new(class, generation)
    }

    pub fn class(&self) -> PartitionClass {
        self.class
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl FromStr for PartitionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Immutable mapping from partition class to its live generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    shell: PartitionName,
    tiles: PartitionName,
}

impl Deployment {
    /// Build a descriptor from the two live partition names.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPartition` if a name does not belong to the
    /// class it is given for.
    pub fn new(shell: PartitionName, tiles: PartitionName) -> Result<Self, Error> {
        if shell.class() != PartitionClass::ApplicationShell {
            return Err(Error::InvalidPartition(format!("{shell} is not an application shell partition")));
        }
        if tiles.class() != PartitionClass::TileImagery {
            return Err(Error::InvalidPartition(format!("{tiles} is not a tile imagery partition")));
        }
        Ok(Self { shell, tiles })
    }

    /// Convenience constructor from generation numbers.
    pub fn with_generations(shell: u32, tiles: u32) -> Result<Self, Error> {
        Self::new(
            PartitionName::new(PartitionClass::ApplicationShell, shell)?,
            PartitionName::new(PartitionClass::TileImagery, tiles)?,
        )
    }

    /// The live partition for a class.
    pub fn live(&self, class: PartitionClass) -> &PartitionName {
        match class {
            PartitionClass::ApplicationShell => &self.shell,
            PartitionClass::TileImagery => &self.tiles,
        }
    }

    /// Whether a stored partition belongs to a known class but is not that
    /// class's live generation.
    pub fn is_stale(&self, stored: &str) -> bool {
        match PartitionClass::of_name(stored) {
            Some(class) => self.live(class).as_str() != stored,
            None => false,
        }
    }

    /// Whether the stored name is one of the live partitions.
    pub fn is_live(&self, stored: &str) -> bool {
        self.shell.as_str() == stored || self.tiles.as_str() == stored
    }

    /// Identifier recorded once this deployment has been installed.
    pub fn id(&self) -> String {
        format!("{}+{}", self.shell, self.tiles)
    }
}

impl Default for Deployment {
    fn default() -> Self {
        Self {
            shell: PartitionName {
                class: PartitionClass::ApplicationShell,
                generation: 1,
                name: "appshell-v1".to_string(),
            },
            tiles: PartitionName { class: PartitionClass::TileImagery, generation: 1, name: "tiles-v1".to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partition_name() {
        let name = PartitionName::parse("tiles-v12").unwrap();
        assert_eq!(name.class(), PartitionClass::TileImagery);
        assert_eq!(name.generation(), 12);
        assert_eq!(name.as_str(), "tiles-v12");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        assert!(PartitionName::parse("tiles").is_err());
        assert!(PartitionName::parse("tiles-12").is_err());
        assert!(PartitionName::parse("tiles-v").is_err());
        assert!(PartitionName::parse("tiles-v0").is_err());
        assert!(PartitionName::parse("mapdata-v1").is_err());
    }

    #[test]
    fn test_class_of_name_requires_separator() {
        assert_eq!(PartitionClass::of_name("appshell-v2"), Some(PartitionClass::ApplicationShell));
        assert_eq!(PartitionClass::of_name("tilesets-v1"), None);
    }

    #[test]
    fn test_deployment_rejects_swapped_classes() {
        let shell = PartitionName::parse("tiles-v1").unwrap();
        let tiles = PartitionName::parse("appshell-v1").unwrap();
        assert!(matches!(Deployment::new(shell, tiles), Err(Error::InvalidPartition(_))));
    }

    #[test]
    fn test_is_stale() {
        let deployment = Deployment::with_generations(2, 3).unwrap();
        assert!(deployment.is_stale("appshell-v1"));
        assert!(deployment.is_stale("tiles-v2"));
        assert!(deployment.is_stale("tiles-legacy"));
        assert!(!deployment.is_stale("appshell-v2"));
        assert!(!deployment.is_stale("tiles-v3"));
        assert!(!deployment.is_stale("another-app-v1"));
    }

    #[test]
    fn test_default_deployment() {
        let deployment = Deployment::default();
        assert_eq!(deployment, Deployment::with_generations(1, 1).unwrap());
        assert_eq!(deployment.id(), "appshell-v1+tiles-v1");
    }
}
