//! Identity, key, and record types for the Aerosure ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monetary amounts in minor units of the native settlement currency.
pub type Money = u64;

/// Opaque caller identity supplied by the host platform, one per call.
///
/// The core never interprets the contents beyond the zero check: the host
/// guarantees uniqueness and authenticity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty or all-zero identity, which no real principal
    /// may carry.
    pub fn is_zero(&self) -> bool {
        let body = self.0.strip_prefix("0x").unwrap_or(&self.0);
        body.is_empty() || body.chars().all(|c| c == '0')
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Deterministic flight identifier derived from the defining tuple.
///
/// Lookup is idempotent: the same (airline, number, scheduled time) always
/// produces the same key, so no central counter is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlightKey(String);

impl FlightKey {
    pub fn derive(airline: &Principal, number: &str, scheduled_at: DateTime<Utc>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(airline.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(number.as_bytes());
        hasher.update(&[0]);
        hasher.update(&scheduled_at.timestamp().to_be_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flight:{}", self.0)
    }
}

/// Deterministic policy identifier: one policy per (client, flight).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyKey(String);

impl PolicyKey {
    pub fn derive(client: &Principal, flight: &FlightKey) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(client.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(flight.as_str().as_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "policy:{}", self.0)
    }
}

/// Deterministic status-request identifier keyed by the assigned reporter
/// index plus the flight tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn derive(
        index: u8,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[index]);
        hasher.update(airline.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(number.as_bytes());
        hasher.update(&[0]);
        hasher.update(&scheduled_at.timestamp().to_be_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request:{}", self.0)
    }
}

/// Flight status as observed by oracle reporters.
///
/// A flight starts Unknown and moves to one terminal code exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl FlightStatus {
    /// Numeric wire code used in request buckets and observer payloads.
    pub fn code(&self) -> u8 {
        match self {
            FlightStatus::Unknown => 0,
            FlightStatus::OnTime => 10,
            FlightStatus::LateAirline => 20,
            FlightStatus::LateWeather => 30,
            FlightStatus::LateTechnical => 40,
            FlightStatus::LateOther => 50,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FlightStatus::Unknown),
            10 => Some(FlightStatus::OnTime),
            20 => Some(FlightStatus::LateAirline),
            30 => Some(FlightStatus::LateWeather),
            40 => Some(FlightStatus::LateTechnical),
            50 => Some(FlightStatus::LateOther),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, FlightStatus::Unknown)
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightStatus::Unknown => "unknown",
            FlightStatus::OnTime => "on_time",
            FlightStatus::LateAirline => "late_airline",
            FlightStatus::LateWeather => "late_weather",
            FlightStatus::LateTechnical => "late_technical",
            FlightStatus::LateOther => "late_other",
        };
        write!(f, "{name}")
    }
}

/// Consortium member record.
///
/// Never destroyed once created; the balance accumulates funding and policy
/// premiums and is drawn down only by settlement credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirlineRecord {
    pub principal: Principal,
    pub name: String,
    pub is_registered: bool,
    pub is_funded: bool,
    pub balance: Money,
}

/// Registered flight record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub airline: Principal,
    pub number: String,
    pub is_registered: bool,
    pub status: FlightStatus,
    pub scheduled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Policy keys in purchase order.
    pub policies: Vec<PolicyKey>,
}

/// Insurance policy between a client and a flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub client: Principal,
    pub flight: FlightKey,
    /// Premium paid at purchase.
    pub value: Money,
    /// Payout credited on settlement, withdrawable by the client.
    pub balance: Money,
    pub is_paid: bool,
}
