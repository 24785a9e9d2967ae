use async_trait::async_trait;
use shared::{
    domain::{LeadId, SystemStatus},
    protocol::{
        CallingConfiguration, LeadPage, LeadQuery, ResetLeadsRequest, SelectByStatusRequest,
        StartCallsRequest,
    },
};

use crate::error::LeadsError;

pub type ApiResult<T> = std::result::Result<T, LeadsError>;

/// Remote leads backend (`/api/calls`).
#[async_trait]
pub trait LeadsApi: Send + Sync {
    async fn list_leads(&self, query: &LeadQuery) -> ApiResult<LeadPage>;
    /// Sets `selected_for_calling` on the given leads; returns the server's
    /// `updated_count`.
    async fn mark_leads(&self, lead_ids: &[LeadId], selected: bool) -> ApiResult<u64>;
    async fn select_by_status(&self, request: &SelectByStatusRequest) -> ApiResult<u64>;
    async fn deselect_all(&self) -> ApiResult<()>;
    async fn reset_leads(&self, request: &ResetLeadsRequest) -> ApiResult<Option<u64>>;
    async fn status(&self) -> ApiResult<SystemStatus>;
    async fn start_calls(&self, request: &StartCallsRequest) -> ApiResult<()>;
    async fn stop_calls(&self) -> ApiResult<()>;
    async fn configuration(&self) -> ApiResult<CallingConfiguration>;
    async fn save_configuration(&self, config: &CallingConfiguration) -> ApiResult<()>;
    /// Whether the backend can reach the telephony provider.
    async fn test_connection(&self) -> ApiResult<bool>;
}
