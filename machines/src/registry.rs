//! Machine registry for automatic runner discovery.
//!
//! Each board self-registers via [`inventory::submit!`] with a
//! [`MachineEntry`] holding its CLI name, a one-line description and a
//! factory. The runner discovers available machines at runtime without any
//! central list.

use marquee_core::core::{ConfigError, ConfigFile, Machine};

/// Describes a runnable board.
pub struct MachineEntry {
    /// CLI name used to select this machine (e.g., "soundlatch").
    pub name: &'static str,
    pub description: &'static str,
    /// Factory: build the machine with timing and open-bus settings from a
    /// config file.
    pub create: fn(&ConfigFile) -> Result<Box<dyn Machine>, ConfigError>,
}

impl MachineEntry {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        create: fn(&ConfigFile) -> Result<Box<dyn Machine>, ConfigError>,
    ) -> Self {
        Self {
            name,
            description,
            create,
        }
    }
}

inventory::collect!(MachineEntry);

/// Return all registered machines, sorted by name.
pub fn all() -> Vec<&'static MachineEntry> {
    let mut entries: Vec<_> = inventory::iter::<MachineEntry>.into_iter().collect();
    entries.sort_by_key(|e| e.name);
    entries
}

/// Look up a machine by its CLI name.
pub fn find(name: &str) -> Option<&'static MachineEntry> {
    inventory::iter::<MachineEntry>
        .into_iter()
        .find(|e| e.name == name)
}
