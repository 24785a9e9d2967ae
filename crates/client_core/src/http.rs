//! reqwest-backed [`LeadsApi`] talking to the `/api/calls` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{LeadId, SystemStatus},
    error::{ApiErrorBody, ApiException},
    protocol::{
        AckResponse, ApiResponse, CallingConfiguration, ConfigurationResponse,
        ConnectionTestResponse, LeadPage, LeadQuery, LeadsResponse, ResetLeadsRequest,
        SelectByStatusRequest, SelectByStatusResponse, SelectLeadsRequest, SelectLeadsResponse,
        StartCallsRequest, StatusResponse,
    },
};
use tracing::{debug, error, warn};
use url::Url;

use crate::{
    api::{ApiResult, LeadsApi},
    error::LeadsError,
};

const API_PREFIX: &str = "api/calls/";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpLeadsApi {
    http: Client,
    base_url: Url,
}

impl HttpLeadsApi {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LeadsError::Invalid(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(&format!("{API_PREFIX}{path}"))
            .map_err(|err| LeadsError::Invalid(format!("invalid endpoint {path}: {err}")))
    }

    async fn send<T>(&self, path: &str, request: RequestBuilder) -> ApiResult<T>
    where
        T: ApiResponse + DeserializeOwned,
    {
        let response = request.send().await.map_err(|err| {
            warn!(endpoint = path, error = %err, "leads api: request failed");
            LeadsError::from(err)
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let error_body = serde_json::from_str::<ApiErrorBody>(&body).unwrap_or_default();
            let err =
                LeadsError::from_response(path, ApiException::new(status.as_u16(), &error_body));
            if err.is_user_facing() {
                error!(endpoint = path, status = status.as_u16(), error = %err, "leads api: request failed");
            } else {
                warn!(endpoint = path, "leads api: endpoint not available on this backend");
            }
            return Err(err);
        }

        let parsed = match serde_json::from_str::<T>(&body) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(endpoint = path, error = %err, "leads api: unparsable body, assuming empty success");
                T::default()
            }
        };

        if !parsed.success() {
            let message = parsed
                .error_message()
                .unwrap_or("operation was not successful")
                .to_string();
            warn!(endpoint = path, error = %message, "leads api: request rejected");
            return Err(LeadsError::Rejected(message));
        }

        Ok(parsed)
    }
}

fn normalize_base_url(raw: &str) -> ApiResult<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|err| LeadsError::Invalid(format!("invalid base url '{raw}': {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LeadsError::Invalid(format!(
            "base url must start with http:// or https://: {raw}"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait]
impl LeadsApi for HttpLeadsApi {
    async fn list_leads(&self, query: &LeadQuery) -> ApiResult<LeadPage> {
        let url = self.endpoint("leads")?;
        let response: LeadsResponse = self
            .send("leads", self.http.get(url).query(&query.query_pairs()))
            .await?;
        if response.leads.skipped > 0 {
            warn!(
                skipped = response.leads.skipped,
                kept = response.leads.leads.len(),
                "leads api: dropped malformed lead records"
            );
        }
        Ok(response.into())
    }

    async fn mark_leads(&self, lead_ids: &[LeadId], selected: bool) -> ApiResult<u64> {
        let url = self.endpoint("leads/select")?;
        let body = SelectLeadsRequest {
            lead_ids: lead_ids.to_vec(),
            selected,
        };
        let response: SelectLeadsResponse = self
            .send("leads/select", self.http.post(url).json(&body))
            .await?;
        Ok(response.updated_count)
    }

    async fn select_by_status(&self, request: &SelectByStatusRequest) -> ApiResult<u64> {
        let url = self.endpoint("leads/select-by-status")?;
        let response: SelectByStatusResponse = self
            .send("leads/select-by-status", self.http.post(url).json(request))
            .await?;
        Ok(response.selected_count)
    }

    async fn deselect_all(&self) -> ApiResult<()> {
        let url = self.endpoint("leads/deselect-all")?;
        let _: AckResponse = self
            .send("leads/deselect-all", self.http.post(url))
            .await?;
        Ok(())
    }

    async fn reset_leads(&self, request: &ResetLeadsRequest) -> ApiResult<Option<u64>> {
        let url = self.endpoint("leads/reset")?;
        let response: AckResponse = self
            .send("leads/reset", self.http.post(url).json(request))
            .await?;
        Ok(response.updated_count)
    }

    async fn status(&self) -> ApiResult<SystemStatus> {
        let url = self.endpoint("status")?;
        let response: StatusResponse = self.send("status", self.http.get(url)).await?;
        Ok(response.data)
    }

    async fn start_calls(&self, request: &StartCallsRequest) -> ApiResult<()> {
        let url = self.endpoint("start")?;
        let _: AckResponse = self.send("start", self.http.post(url).json(request)).await?;
        Ok(())
    }

    async fn stop_calls(&self) -> ApiResult<()> {
        let url = self.endpoint("stop")?;
        let _: AckResponse = self.send("stop", self.http.post(url)).await?;
        Ok(())
    }

    async fn configuration(&self) -> ApiResult<CallingConfiguration> {
        let url = self.endpoint("config")?;
        let response: ConfigurationResponse = self.send("config", self.http.get(url)).await?;
        Ok(response.config)
    }

    async fn save_configuration(&self, config: &CallingConfiguration) -> ApiResult<()> {
        let url = self.endpoint("configuration")?;
        let _: AckResponse = self
            .send("configuration", self.http.post(url).json(config))
            .await?;
        Ok(())
    }

    async fn test_connection(&self) -> ApiResult<bool> {
        let url = self.endpoint("test/connection")?;
        let response: ConnectionTestResponse =
            self.send("test/connection", self.http.get(url)).await?;
        Ok(response.pearl_connection)
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
