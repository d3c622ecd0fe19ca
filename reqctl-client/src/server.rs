use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::{collections::HashSet, time::Duration};
use tracing::{debug, error, info, warn};

use crate::{
    auth::Session,
    config::Config,
    error::{ActionError, FetchError, FetchTarget},
    requests::service::{ActionExecutor, OrganizationSource, RequestFetcher},
    retry_async,
};

pub use reqctl_shared::{
    org::Organization,
    requests::{Decision, DecisionAck, DecisionBody, MembershipRequest},
};

const FETCH_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 250;

/// HTTP client for the membership service.
#[derive(Clone)]
pub struct ServerClient {
    api_url: Url,
    token: String,
    client: Client,
    retry_delay_ms: u64,
}

impl ServerClient {
    pub fn new(
        api_url: &str,
        token: &str,
        timeout: Duration,
        trust_invalid_server_cert: bool,
    ) -> Result<Self> {
        let api_url = Url::parse(api_url).with_context(|| format!("Invalid API URL {api_url}"))?;
        Ok(Self {
            api_url,
            token: token.to_string(),
            client: get_client(timeout, trust_invalid_server_cert)?,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        })
    }

    pub fn from_config(config: &Config, session: &Session) -> Result<Self> {
        Self::new(
            &config.get_server_url()?,
            &session.token,
            config.request_timeout(),
            config.trust_invalid_server_cert,
        )
    }

    pub fn with_retry_delay(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, String> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| format!("API URL {} cannot be a base", self.api_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, String> {
        let res = retry_async!(
            FETCH_ATTEMPTS,
            self.retry_delay_ms,
            self.client.get(url.clone()).bearer_auth(&self.token).send()
        )
        .map_err(|e| {
            error!("GET {} failed: {:?}", url, e);
            e.to_string()
        })?;

        match res.error_for_status() {
            Ok(r) => r.json::<T>().await.map_err(|e| {
                error!("Failed to decode response from {}: {}", url, e);
                format!("invalid response: {e}")
            }),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[async_trait]
impl OrganizationSource for ServerClient {
    async fn fetch_organizations(&self) -> Result<Vec<Organization>, FetchError> {
        let fail = |reason: String| FetchError::new(FetchTarget::Organizations, reason);
        let url = self.endpoint(&["organizations"]).map_err(fail)?;
        let orgs: Vec<Organization> = self.get_json(url).await.map_err(fail)?;

        // avoid duplicate organizations
        let mut seen = HashSet::new();
        let orgs: Vec<Organization> = orgs
            .into_iter()
            .filter(|org| seen.insert(org.id.clone()))
            .collect();

        debug!("fetched {} organizations", orgs.len());
        Ok(orgs)
    }
}

#[async_trait]
impl RequestFetcher for ServerClient {
    async fn fetch_requests(
        &self,
        organization_id: &str,
    ) -> Result<Vec<MembershipRequest>, FetchError> {
        let fail = |reason: String| FetchError::new(FetchTarget::Requests, reason);
        let url = self
            .endpoint(&["organizations", organization_id, "membership-requests"])
            .map_err(fail)?;
        let mut requests: Vec<MembershipRequest> = self.get_json(url).await.map_err(fail)?;

        for request in requests.iter_mut() {
            if request.organization_id.is_empty() {
                request.organization_id = organization_id.to_string();
            }
        }

        debug!(
            "fetched {} membership requests for {}",
            requests.len(),
            organization_id
        );
        Ok(requests)
    }
}

#[async_trait]
impl ActionExecutor for ServerClient {
    async fn decide(
        &self,
        request_id: &str,
        decision: Decision,
    ) -> Result<DecisionAck, ActionError> {
        let url = self
            .endpoint(&["membership-requests", request_id, "decision"])
            .map_err(ActionError::network)?;

        let res = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&DecisionBody {
                request_id: request_id.to_string(),
                decision,
            })
            .send()
            .await
            .map_err(|e| {
                warn!("{} {} failed to send: {}", decision, request_id, e);
                ActionError::network(e.to_string())
            })?;

        let status = res.status();
        let text = res.text().await.unwrap_or_default();

        if !status.is_success() {
            let err = ActionError::from_status(status.as_u16(), &text);
            warn!("{} {} rejected by server: {}", decision, request_id, err);
            return Err(err);
        }

        info!("{} {} acknowledged", decision, request_id);
        // some deployments answer with an empty body
        let mut ack = serde_json::from_str::<DecisionAck>(&text).unwrap_or_default();
        if ack.request_id.is_empty() {
            ack.request_id = request_id.to_string();
        }
        Ok(ack)
    }
}

fn get_client(timeout: Duration, trust_invalid_server_cert: bool) -> Result<Client> {
    let builder = Client::builder().timeout(timeout);
    // if its localhost we accept invalid certificates
    let builder = if trust_invalid_server_cert {
        builder.danger_accept_invalid_certs(true)
    } else {
        builder
    };
    Ok(builder.build()?)
}
