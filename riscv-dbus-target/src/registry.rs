//! Lookup of chip descriptions by name.

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::ChipDescription;

/// Error type for all errors which occur when looking up chip descriptions.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The requested chip was not found in the registry.
    #[error("The requested chip '{0}' was not found in the list of known targets.")]
    ChipNotFound(String),
    /// The chip description could not be parsed.
    #[error("Failed to parse the chip description.")]
    Yaml(#[from] serde_yaml::Error),
    /// The chip description is inconsistent.
    #[error("Invalid chip description for '{name}': {reason}")]
    InvalidDescription {
        /// Name of the offending chip.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

const BUILTIN_TARGETS: &[&str] = &[include_str!("../targets/esp32h2.yaml")];

/// A collection of chip descriptions.
#[derive(Debug, Default)]
pub struct Registry {
    chips: Vec<ChipDescription>,
}

impl Registry {
    /// Create a registry containing the builtin chip descriptions.
    pub fn from_builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for yaml in BUILTIN_TARGETS {
            registry.add_from_yaml(yaml)?;
        }
        Ok(registry)
    }

    /// All known chips.
    pub fn chips(&self) -> &[ChipDescription] {
        &self.chips
    }

    /// Look up a chip by name. The comparison ignores ASCII case.
    pub fn get_chip(&self, name: &str) -> Result<&ChipDescription, RegistryError> {
        self.chips
            .iter()
            .find(|chip| chip.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| RegistryError::ChipNotFound(name.to_string()))
    }

    /// Parse a chip description from YAML and add it to the registry.
    ///
    /// A description with the same name as an existing one replaces it.
    /// Returns the name of the added chip.
    pub fn add_from_yaml(&mut self, yaml: &str) -> Result<String, RegistryError> {
        let chip: ChipDescription = serde_yaml::from_str(yaml)?;
        validate(&chip)?;

        let name = chip.name.clone();
        self.chips
            .retain(|existing| !existing.name.eq_ignore_ascii_case(&name));
        self.chips.push(chip);

        Ok(name)
    }
}

fn validate(chip: &ChipDescription) -> Result<(), RegistryError> {
    let invalid = |reason| RegistryError::InvalidDescription {
        name: chip.name.clone(),
        reason,
    };

    if chip.boot_mode.flash_boot.is_empty() {
        return Err(invalid("no flash boot pattern"));
    }
    if !chip.is_flash_boot(chip.boot_mode.fallback_strap) {
        return Err(invalid("the fallback strap value does not select flash boot"));
    }
    if chip.debug_link.busy_retries == 0 {
        return Err(invalid("busy_retries must be at least 1"));
    }

    Ok(())
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| {
    let registry = Registry::from_builtin()
        .unwrap_or_else(|error| panic!("Builtin chip descriptions are invalid: {error}"));
    Mutex::new(registry)
});

/// Get a copy of the chip description with the given name from the global registry.
pub fn get_chip_by_name(name: &str) -> Result<ChipDescription, RegistryError> {
    REGISTRY.lock().get_chip(name).cloned()
}

/// Add a chip description to the global registry. Returns the name of the chip.
pub fn add_target_from_yaml(yaml: &str) -> Result<String, RegistryError> {
    REGISTRY.lock().add_from_yaml(yaml)
}
