use std::fmt;

use chrono::NaiveDateTime;
use serde::{
    de::{self, IgnoredAny},
    Deserialize, Deserializer, Serialize,
};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(LeadId);

pub const DEFAULT_CALL_PRIORITY: i32 = 3;
const MISSING: &str = "N/A";

/// Lifecycle of the most recent call attempt for a lead.
///
/// The backend stores this as free text, so values outside the known set
/// are kept verbatim in [`CallStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum CallStatus {
    #[default]
    NoSelected,
    Selected,
    Calling,
    Completed,
    Error,
    Busy,
    NoAnswer,
    Other(String),
}

impl CallStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CallStatus::NoSelected => "no_selected",
            CallStatus::Selected => "selected",
            CallStatus::Calling => "calling",
            CallStatus::Completed => "completed",
            CallStatus::Error => "error",
            CallStatus::Busy => "busy",
            CallStatus::NoAnswer => "no_answer",
            CallStatus::Other(raw) => raw,
        }
    }

    /// Attempt ended without reaching the lead.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CallStatus::Error | CallStatus::Busy | CallStatus::NoAnswer
        ) || matches!(self, CallStatus::Other(raw) if raw == "failed")
    }

    pub fn is_active(&self) -> bool {
        matches!(self, CallStatus::Calling)
            || matches!(self, CallStatus::Other(raw) if raw == "in_progress")
    }
}

impl From<&str> for CallStatus {
    fn from(value: &str) -> Self {
        match value {
            "" | "no_selected" => CallStatus::NoSelected,
            "selected" => CallStatus::Selected,
            "calling" => CallStatus::Calling,
            "completed" => CallStatus::Completed,
            "error" => CallStatus::Error,
            "busy" => CallStatus::Busy,
            "no_answer" => CallStatus::NoAnswer,
            other => CallStatus::Other(other.to_string()),
        }
    }
}

impl From<Option<String>> for CallStatus {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(CallStatus::from).unwrap_or_default()
    }
}

impl From<CallStatus> for String {
    fn from(value: CallStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contact record as returned by `GET /api/calls/leads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(deserialize_with = "lead_id")]
    pub id: LeadId,
    #[serde(default, rename = "nombre")]
    pub first_name: Option<String>,
    #[serde(default, rename = "apellidos")]
    pub last_name: Option<String>,
    #[serde(default, rename = "telefono")]
    pub phone: Option<String>,
    #[serde(default, rename = "telefono2", skip_serializing_if = "Option::is_none")]
    pub alt_phone: Option<String>,
    #[serde(default, rename = "ciudad")]
    pub city: Option<String>,
    #[serde(default, rename = "nombre_clinica")]
    pub clinic_name: Option<String>,
    #[serde(default)]
    pub status_level_1: Option<String>,
    #[serde(default)]
    pub status_level_2: Option<String>,
    #[serde(default)]
    pub call_status: CallStatus,
    #[serde(default = "default_priority", deserialize_with = "priority_or_default")]
    pub call_priority: i32,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub call_attempts_count: u32,
    #[serde(
        default,
        rename = "last_call_attempt",
        alias = "last_call_time",
        deserialize_with = "lenient_timestamp"
    )]
    pub last_call_time: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "flag_from_bool_or_int")]
    pub selected_for_calling: bool,
    #[serde(default, rename = "origen_archivo")]
    pub origin_file: Option<String>,
}

impl Lead {
    /// Minimal lead with every optional field empty.
    pub fn new(id: LeadId) -> Self {
        Self {
            id,
            first_name: None,
            last_name: None,
            phone: None,
            alt_phone: None,
            city: None,
            clinic_name: None,
            status_level_1: None,
            status_level_2: None,
            call_status: CallStatus::default(),
            call_priority: DEFAULT_CALL_PRIORITY,
            call_attempts_count: 0,
            last_call_time: None,
            selected_for_calling: false,
            origin_file: None,
        }
    }

    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            MISSING.to_string()
        } else {
            parts.join(" ")
        }
    }

    pub fn display_phone(&self) -> &str {
        non_empty(self.phone.as_deref())
            .or_else(|| non_empty(self.alt_phone.as_deref()))
            .unwrap_or(MISSING)
    }

    pub fn display_city(&self) -> &str {
        non_empty(self.city.as_deref()).unwrap_or(MISSING)
    }

    pub fn display_clinic(&self) -> &str {
        non_empty(self.clinic_name.as_deref()).unwrap_or(MISSING)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_priority() -> i32 {
    DEFAULT_CALL_PRIORITY
}

/// Numeric column as the backend may send it: a JSON number, a numeric
/// string, or something unusable.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberRepr {
    Int(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

impl NumberRepr {
    fn as_i64(&self) -> Option<i64> {
        match self {
            NumberRepr::Int(value) => Some(*value),
            NumberRepr::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            NumberRepr::Text(raw) => raw.trim().parse().ok(),
            _ => None,
        }
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<NumberRepr>::deserialize(deserializer)?.and_then(|repr| repr.as_i64()))
}

fn lead_id<'de, D>(deserializer: D) -> Result<LeadId, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer)?
        .map(LeadId)
        .ok_or_else(|| de::Error::custom("lead id is not an integer"))
}

fn priority_or_default<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .and_then(|value| i32::try_from(value).ok())
        .unwrap_or(DEFAULT_CALL_PRIORITY))
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(0))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bool(bool),
    Int(i64),
}

fn flag_from_bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<FlagRepr>::deserialize(deserializer)? {
        Some(FlagRepr::Bool(flag)) => flag,
        Some(FlagRepr::Int(value)) => value != 0,
        None => false,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    Ok(NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok())
}

/// Counters reported by the calling engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub error: u64,
    #[serde(default)]
    pub in_progress: u64,
}

impl CallStats {
    /// Finished attempts (completed or failed) as a percentage of `total`.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed + self.error) as f64 / self.total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub stats: CallStats,
}

/// Lead column used by the bulk select-by-status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusField {
    #[serde(rename = "status_level_1")]
    StatusLevel1,
    #[serde(rename = "status_level_2")]
    StatusLevel2,
}

impl StatusField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "status_level_1" | "estado1" | "1" => Some(StatusField::StatusLevel1),
            "status_level_2" | "estado2" | "2" => Some(StatusField::StatusLevel2),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
