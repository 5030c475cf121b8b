use serde::{Deserialize, Serialize};

/// One named telemetry quantity read from the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Speed,
    Rpm,
    Coolant,
    FuelLevel,
    FuelCons,
    Maf,
    Oxygen,
    Throttle,
    IntakeManifold,
    Battery,
    DiagnosticCodes,
}

/// Every channel, in a fixed order. Numeric channels first, codes last.
pub const ALL_CHANNELS: [Channel; 11] = [
    Channel::Speed,
    Channel::Rpm,
    Channel::Coolant,
    Channel::FuelLevel,
    Channel::FuelCons,
    Channel::Maf,
    Channel::Oxygen,
    Channel::Throttle,
    Channel::IntakeManifold,
    Channel::Battery,
    Channel::DiagnosticCodes,
];

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Speed => "speed",
            Channel::Rpm => "rpm",
            Channel::Coolant => "coolant",
            Channel::FuelLevel => "fuel_level",
            Channel::FuelCons => "fuel_cons",
            Channel::Maf => "maf",
            Channel::Oxygen => "oxygen",
            Channel::Throttle => "throttle",
            Channel::IntakeManifold => "intake_manifold",
            Channel::Battery => "battery",
            Channel::DiagnosticCodes => "diagnostic_codes",
        }
    }

    pub fn from_str(value: &str) -> Option<Channel> {
        match value {
            "speed" => Some(Channel::Speed),
            "rpm" => Some(Channel::Rpm),
            "coolant" => Some(Channel::Coolant),
            "fuel_level" => Some(Channel::FuelLevel),
            "fuel_cons" => Some(Channel::FuelCons),
            "maf" => Some(Channel::Maf),
            "oxygen" => Some(Channel::Oxygen),
            "throttle" => Some(Channel::Throttle),
            "intake_manifold" => Some(Channel::IntakeManifold),
            "battery" => Some(Channel::Battery),
            "diagnostic_codes" => Some(Channel::DiagnosticCodes),
            _ => None,
        }
    }

    /// Numeric channels carry an f64 reading; the diagnostic-codes channel
    /// carries trouble-code strings instead.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Channel::DiagnosticCodes)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
