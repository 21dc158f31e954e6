//! Hub modes and HSM commands

use std::fmt;

use maker_api::ModeInfo;
use serde::{Deserialize, Serialize};

/// A hub mode such as "Day" or "Night".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    /// Hub id; `None` for a placeholder not yet confirmed by the hub
    pub id: Option<String>,
    pub name: String,
    pub active: bool,
}

impl Mode {
    /// An active entry for a mode the hub reported but the list did not contain yet.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            active: true,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id.is_none()
    }
}

impl From<ModeInfo> for Mode {
    fn from(info: ModeInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            active: info.active,
        }
    }
}

/// Mark the mode called `name` active and every other mode inactive.
///
/// When no mode has that name a placeholder is appended. Returns `false` in
/// that case so the caller can reload the list from the hub.
pub(crate) fn activate_mode(modes: &mut Vec<Mode>, name: &str) -> bool {
    let mut found = false;
    for mode in modes.iter_mut() {
        // a duplicate name from the hub must not end up with two active entries
        mode.active = !found && mode.name == name;
        found |= mode.active;
    }

    if !found {
        modes.push(Mode::placeholder(name));
    }
    found
}

/// Commands accepted by the hub's security monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HsmCommand {
    ArmAway,
    ArmHome,
    ArmNight,
    ArmAll,
    Disarm,
    DisarmAll,
    CancelAlerts,
}

impl HsmCommand {
    pub const ALL: [HsmCommand; 7] = [
        HsmCommand::ArmAway,
        HsmCommand::ArmHome,
        HsmCommand::ArmNight,
        HsmCommand::ArmAll,
        HsmCommand::Disarm,
        HsmCommand::DisarmAll,
        HsmCommand::CancelAlerts,
    ];

    /// The command as it appears in the `hsm/{command}` path
    pub fn as_str(&self) -> &'static str {
        match self {
            HsmCommand::ArmAway => "armAway",
            HsmCommand::ArmHome => "armHome",
            HsmCommand::ArmNight => "armNight",
            HsmCommand::ArmAll => "armAll",
            HsmCommand::Disarm => "disarm",
            HsmCommand::DisarmAll => "disarmAll",
            HsmCommand::CancelAlerts => "cancelAlerts",
        }
    }
}

impl fmt::Display for HsmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HsmCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HsmCommand::ALL
            .into_iter()
            .find(|command| command.as_str() == s)
            .ok_or_else(|| format!("unknown HSM command: {s}"))
    }
}
