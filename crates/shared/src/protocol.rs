use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    domain::{Lead, LeadId, StatusField, SystemStatus},
    filter::FilterSet,
    pagination::PaginationState,
};

/// Common shape of every `/api/calls` response body.
///
/// Bodies that fail to parse are replaced by `Default`, which must read as
/// an empty success.
pub trait ApiResponse: Default {
    fn success(&self) -> bool;
    fn error_message(&self) -> Option<&str>;
}

macro_rules! api_response {
    ($name:ident) => {
        impl ApiResponse for $name {
            fn success(&self) -> bool {
                self.success
            }

            fn error_message(&self) -> Option<&str> {
                self.error.as_deref()
            }
        }
    };
}

fn default_true() -> bool {
    true
}

/// Query for one window of the lead list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LeadQuery {
    pub filters: FilterSet,
    pub limit: u64,
    pub offset: u64,
}

impl LeadQuery {
    pub fn new(filters: FilterSet, pagination: PaginationState) -> Self {
        Self {
            filters,
            limit: pagination.limit,
            offset: pagination.offset,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = self.filters.query_pairs();
        pairs.push(("limit", self.limit.to_string()));
        pairs.push(("offset", self.offset.to_string()));
        pairs
    }
}

/// The `leads` array of a list response. Elements are parsed one by one;
/// a malformed record is counted in `skipped` instead of failing the body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LeadRecords {
    pub leads: Vec<Lead>,
    #[serde(skip)]
    pub skipped: usize,
}

impl<'de> Deserialize<'de> for LeadRecords {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
        let received = raw.len();
        let leads: Vec<Lead> = raw
            .into_iter()
            .filter_map(|record| serde_json::from_value(record).ok())
            .collect();
        Ok(Self {
            skipped: received - leads.len(),
            leads,
        })
    }
}

impl From<Vec<Lead>> for LeadRecords {
    fn from(leads: Vec<Lead>) -> Self {
        Self { leads, skipped: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadsResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub leads: LeadRecords,
    #[serde(default)]
    pub pagination: PaginationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for LeadsResponse {
    fn default() -> Self {
        Self {
            success: true,
            leads: LeadRecords::default(),
            pagination: PaginationState::default(),
            error: None,
        }
    }
}

api_response!(LeadsResponse);

/// One fetched window of leads plus the server's totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadPage {
    pub leads: Vec<Lead>,
    pub pagination: PaginationState,
}

impl From<LeadsResponse> for LeadPage {
    fn from(value: LeadsResponse) -> Self {
        Self {
            leads: value.leads.leads,
            pagination: value.pagination,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectLeadsRequest {
    pub lead_ids: Vec<LeadId>,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectLeadsResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub updated_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for SelectLeadsResponse {
    fn default() -> Self {
        Self {
            success: true,
            updated_count: 0,
            error: None,
        }
    }
}

api_response!(SelectLeadsResponse);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectByStatusRequest {
    pub status_field: StatusField,
    pub status_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archivo_origen: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectByStatusResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub selected_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for SelectByStatusResponse {
    fn default() -> Self {
        Self {
            success: true,
            selected_count: 0,
            error: None,
        }
    }
}

api_response!(SelectByStatusResponse);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetLeadsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_ids: Option<Vec<LeadId>>,
    pub reset_attempts: bool,
    pub reset_selection: bool,
}

/// Body of endpoints that only acknowledge (`deselect-all`, `reset`,
/// `start`, `stop`, `configuration`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for AckResponse {
    fn default() -> Self {
        Self {
            success: true,
            updated_count: None,
            message: None,
            error: None,
        }
    }
}

api_response!(AckResponse);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub data: SystemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for StatusResponse {
    fn default() -> Self {
        Self {
            success: true,
            data: SystemStatus::default(),
            error: None,
        }
    }
}

api_response!(StatusResponse);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCallsRequest {
    pub max_concurrent: u32,
    pub selected_leads: Vec<LeadId>,
    pub override_phone: Option<String>,
}

/// Persisted calling-engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallingConfiguration {
    pub max_concurrent_calls: u32,
}

impl Default for CallingConfiguration {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default, alias = "configuration")]
    pub config: CallingConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for ConfigurationResponse {
    fn default() -> Self {
        Self {
            success: true,
            config: CallingConfiguration::default(),
            error: None,
        }
    }
}

api_response!(ConfigurationResponse);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTestResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub pearl_connection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for ConnectionTestResponse {
    fn default() -> Self {
        Self {
            success: true,
            pearl_connection: false,
            error: None,
        }
    }
}

api_response!(ConnectionTestResponse);
