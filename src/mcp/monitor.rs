//! Diagnostic command tables.
//!
//! [`MonitorKind`] and [`ResourceKind`] are closed sets; their command tables
//! are exhaustive `match`es so adding a variant without commands does not
//! compile.

use std::fmt;
use std::str::FromStr;

use super::error::GatewayError;

/// What `system_monitor` reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MonitorKind {
    Cpu,
    Memory,
    Disk,
    Network,
    #[default]
    All,
}

impl MonitorKind {
    pub const ALL: [MonitorKind; 5] = [
        MonitorKind::Cpu,
        MonitorKind::Memory,
        MonitorKind::Disk,
        MonitorKind::Network,
        MonitorKind::All,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MonitorKind::Cpu => "cpu",
            MonitorKind::Memory => "memory",
            MonitorKind::Disk => "disk",
            MonitorKind::Network => "network",
            MonitorKind::All => "all",
        }
    }

    /// Commands run for this kind, in output order.
    pub fn commands(self) -> &'static [&'static str] {
        match self {
            MonitorKind::Cpu => &["uptime", "top -bn1 | head -20"],
            MonitorKind::Memory => &["free -h", "vmstat -s | head -10"],
            MonitorKind::Disk => &["df -h", "df -i"],
            MonitorKind::Network => &["ss -tuln", "ip -brief addr"],
            MonitorKind::All => &[
                "uptime",
                "free -h",
                "df -h",
                "top -bn1 | head -20",
                "ss -tuln",
            ],
        }
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MonitorKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == lower)
            .ok_or_else(|| {
                GatewayError::Validation(format!(
                    "type must be one of cpu, memory, disk, network, all (got '{}')",
                    s
                ))
            })
    }
}

/// Read-only resource endpoints, one fixed command each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Info,
    Processes,
    Disk,
    Memory,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Info,
        ResourceKind::Processes,
        ResourceKind::Disk,
        ResourceKind::Memory,
    ];

    pub fn uri(self) -> &'static str {
        match self {
            ResourceKind::Info => "system/info",
            ResourceKind::Processes => "system/processes",
            ResourceKind::Disk => "system/disk",
            ResourceKind::Memory => "system/memory",
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            ResourceKind::Info => "uname -a",
            ResourceKind::Processes => "ps aux --sort=-%cpu | head -20",
            ResourceKind::Disk => "df -h",
            ResourceKind::Memory => "free -h",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.uri() == uri)
    }
}
