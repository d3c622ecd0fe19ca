//! Seams between the controller and the remote membership service.

use async_trait::async_trait;
use reqctl_shared::{
    org::Organization,
    requests::{Decision, DecisionAck, MembershipRequest},
};
use std::sync::Arc;

use crate::error::{ActionError, FetchError};

#[async_trait]
pub trait OrganizationSource: Send + Sync {
    /// An empty list is a valid answer, not an error.
    async fn fetch_organizations(&self) -> Result<Vec<Organization>, FetchError>;
}

#[async_trait]
pub trait RequestFetcher: Send + Sync {
    async fn fetch_requests(
        &self,
        organization_id: &str,
    ) -> Result<Vec<MembershipRequest>, FetchError>;
}

#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Performs exactly one remote call. Never retried.
    async fn decide(&self, request_id: &str, decision: Decision)
    -> Result<DecisionAck, ActionError>;
}

/// The three collaborators a controller talks to.
#[derive(Clone)]
pub struct Services {
    pub organizations: Arc<dyn OrganizationSource>,
    pub requests: Arc<dyn RequestFetcher>,
    pub actions: Arc<dyn ActionExecutor>,
}

impl Services {
    /// Uses one backend for all three roles.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: OrganizationSource + RequestFetcher + ActionExecutor + 'static,
    {
        Self {
            organizations: backend.clone(),
            requests: backend.clone(),
            actions: backend,
        }
    }
}
