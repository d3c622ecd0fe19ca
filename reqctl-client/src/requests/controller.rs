use reqctl_shared::{
    org::Organization,
    requests::{Decision, DecisionAck, MembershipRequest},
    users::Operator,
};
use std::{
    collections::{BTreeSet, HashSet},
    future::Future,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    auth::require_superadmin,
    config::Config,
    error::{ActionError, AuthorizationError, FetchError},
    requests::{
        debounce::Debounce,
        service::Services,
        view::{self, EmptyState, SortOrder},
    },
};

pub const ACCEPTED_MESSAGE: &str = "Request accepted successfully";
pub const REJECTED_MESSAGE: &str = "Request rejected successfully";

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub search_debounce: Duration,
    /// Selected automatically once organizations load, if present.
    pub preferred_organization: Option<String>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            search_debounce: Duration::from_millis(300),
            preferred_organization: None,
        }
    }
}

impl From<&Config> for ControllerOptions {
    fn from(config: &Config) -> Self {
        Self {
            search_debounce: config.search_debounce(),
            preferred_organization: config.organization_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizationsState {
    Idle,
    Loading,
    Loaded(Vec<Organization>),
    Failed(String),
}

/// Progress of the request list for the active organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestsState {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// Transient message for the presentation layer to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }

    fn decided(decision: Decision) -> Self {
        match decision {
            Decision::Accept => Self::success(ACCEPTED_MESSAGE),
            Decision::Reject => Self::success(REJECTED_MESSAGE),
        }
    }
}

/// What changed after `next_event` applied one outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    OrganizationsLoaded {
        count: usize,
    },
    OrganizationsFailed {
        notification: Notification,
    },
    RequestsLoaded {
        organization_id: String,
        count: usize,
    },
    RequestsFailed {
        organization_id: String,
        notification: Notification,
    },
    /// A superseded fetch finished late and was dropped.
    StaleFetchDiscarded {
        organization_id: String,
    },
    SearchSettled {
        search_text: String,
    },
    DecisionApplied {
        request_id: String,
        decision: Decision,
        notification: Notification,
    },
    DecisionFailed {
        request_id: String,
        decision: Decision,
        error: ActionError,
        notification: Notification,
    },
}

impl ControllerEvent {
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            ControllerEvent::OrganizationsFailed { notification }
            | ControllerEvent::RequestsFailed { notification, .. }
            | ControllerEvent::DecisionApplied { notification, .. }
            | ControllerEvent::DecisionFailed { notification, .. } => Some(notification),
            _ => None,
        }
    }
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub view_items: Vec<MembershipRequest>,
    pub empty_state: EmptyState,
    /// Raw input, possibly not applied yet.
    pub search_text: String,
    pub applied_search: String,
    pub sort_order: SortOrder,
    pub pending_action_ids: BTreeSet<String>,
    pub organizations: OrganizationsState,
    pub organization_empty_state: EmptyState,
    pub active_organization: Option<String>,
    pub requests_state: RequestsState,
}

enum Outcome {
    Organizations(Result<Vec<Organization>, FetchError>),
    Requests {
        organization_id: String,
        generation: u64,
        result: Result<Vec<MembershipRequest>, FetchError>,
    },
    Decision {
        request_id: String,
        decision: Decision,
        result: Result<DecisionAck, ActionError>,
    },
}

enum Wake {
    Outcome(Option<Outcome>),
    SearchDue,
}

/// Owns the request list for one view lifetime.
///
/// Remote calls run on spawned tasks which only report back over a channel;
/// state changes happen exclusively in `next_event`, so the controller is the
/// single writer.
pub struct RequestListController {
    operator: Operator,
    services: Services,
    preferred_organization: Option<String>,

    requests: Vec<MembershipRequest>,
    view: Vec<MembershipRequest>,
    search_input: String,
    applied_search: String,
    sort_order: SortOrder,
    pending: HashSet<String>,

    organizations: OrganizationsState,
    active_organization: Option<String>,
    fetch_generation: u64,
    fetch_task: Option<JoinHandle<()>>,
    requests_state: RequestsState,
    // a list has been received at least once
    has_loaded: bool,

    search: Debounce<String>,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    outcome_rx: mpsc::UnboundedReceiver<Outcome>,
    cancel: CancellationToken,
}

impl RequestListController {
    /// Fails for anyone but a superadmin; no fetch is ever issued then.
    pub fn new(
        operator: &Operator,
        services: Services,
        options: ControllerOptions,
    ) -> Result<Self, AuthorizationError> {
        require_superadmin(operator.role)?;

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Ok(Self {
            operator: operator.clone(),
            services,
            preferred_organization: options.preferred_organization,
            requests: Vec::new(),
            view: Vec::new(),
            search_input: String::new(),
            applied_search: String::new(),
            sort_order: SortOrder::default(),
            pending: HashSet::new(),
            organizations: OrganizationsState::Idle,
            active_organization: None,
            fetch_generation: 0,
            fetch_task: None,
            requests_state: RequestsState::Idle,
            has_loaded: false,
            search: Debounce::new(options.search_debounce),
            outcome_tx,
            outcome_rx,
            cancel: CancellationToken::new(),
        })
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn spawn<F>(&self, call: F) -> JoinHandle<()>
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let tx = self.outcome_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                outcome = call => {
                    // receiver is gone after teardown
                    let _ = tx.send(outcome);
                }
            }
        })
    }

    pub fn load_organizations(&mut self) {
        if self.is_torn_down() {
            return;
        }
        self.organizations = OrganizationsState::Loading;
        let source = self.services.organizations.clone();
        self.spawn(async move { Outcome::Organizations(source.fetch_organizations().await) });
    }

    /// Starts a fetch for `organization_id`, superseding any earlier one.
    pub fn select_organization(&mut self, organization_id: &str) {
        if self.is_torn_down() {
            return;
        }
        if let Some(previous) = self.fetch_task.take() {
            previous.abort();
        }
        self.fetch_generation += 1;
        self.active_organization = Some(organization_id.to_string());
        self.requests_state = RequestsState::Loading;

        let generation = self.fetch_generation;
        let organization_id = organization_id.to_string();
        let fetcher = self.services.requests.clone();
        debug!("fetching requests for {} (#{})", organization_id, generation);
        self.fetch_task = Some(self.spawn(async move {
            let result = fetcher.fetch_requests(&organization_id).await;
            Outcome::Requests {
                organization_id,
                generation,
                result,
            }
        }));
    }

    pub fn refresh(&mut self) {
        if let Some(organization_id) = self.active_organization.clone() {
            self.select_organization(&organization_id);
        }
    }

    /// Input edge of the search box: applied once typing settles.
    pub fn set_search_text(&mut self, text: impl Into<String>) {
        if self.is_torn_down() {
            return;
        }
        let text = text.into();
        self.search_input = text.clone();
        self.search.push(text);
    }

    /// Applies pending search input without waiting for the quiet period.
    pub fn flush_search(&mut self) -> bool {
        match self.search.flush() {
            Some(text) => {
                self.apply_search(text);
                true
            }
            None => false,
        }
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        if self.sort_order != order {
            self.sort_order = order;
            self.recompute();
        }
    }

    /// Returns false without side effects when the request is unknown or
    /// already has a decision in flight.
    pub fn submit_decision(&mut self, request_id: &str, decision: Decision) -> bool {
        if self.is_torn_down() {
            return false;
        }
        if !self.requests.iter().any(|r| r.id == request_id) {
            debug!("ignoring {} for unknown request {}", decision, request_id);
            return false;
        }
        if !self.pending.insert(request_id.to_string()) {
            debug!("{} already pending for {}", decision, request_id);
            return false;
        }

        let executor = self.services.actions.clone();
        let request_id = request_id.to_string();
        info!("submitting {} for {}", decision, request_id);
        self.spawn(async move {
            let result = executor.decide(&request_id, decision).await;
            Outcome::Decision {
                request_id,
                decision,
                result,
            }
        });
        true
    }

    /// Waits for the next completed call or settled search and applies it.
    ///
    /// Cancel safe: dropping the future loses nothing. Returns `None` once
    /// the controller has been torn down.
    pub async fn next_event(&mut self) -> Option<ControllerEvent> {
        loop {
            if self.is_torn_down() {
                return None;
            }

            let deadline = self.search.deadline();
            let wake = tokio::select! {
                outcome = self.outcome_rx.recv() => Wake::Outcome(outcome),
                _ = wait_until(deadline) => Wake::SearchDue,
            };

            match wake {
                Wake::Outcome(Some(outcome)) => {
                    if self.is_torn_down() {
                        return None;
                    }
                    return Some(self.apply(outcome));
                }
                Wake::Outcome(None) => return None,
                Wake::SearchDue => {
                    if let Some(text) = self.search.take_due(Instant::now()) {
                        return Some(self.apply_search(text));
                    }
                }
            }
        }
    }

    /// Stops all in-flight work; nothing mutates state afterwards.
    pub fn teardown(&mut self) {
        if self.is_torn_down() {
            return;
        }
        self.cancel.cancel();
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
        self.search.cancel();
        self.outcome_rx.close();
        debug!("request list controller torn down");
    }

    fn apply(&mut self, outcome: Outcome) -> ControllerEvent {
        match outcome {
            Outcome::Organizations(Ok(orgs)) => {
                let count = orgs.len();
                info!("loaded {} organizations", count);
                let pick = self.pick_organization(&orgs);
                self.organizations = OrganizationsState::Loaded(orgs);
                if self.active_organization.is_none() {
                    if let Some(organization_id) = pick {
                        self.select_organization(&organization_id);
                    }
                }
                ControllerEvent::OrganizationsLoaded { count }
            }
            Outcome::Organizations(Err(err)) => {
                warn!("{}", err);
                self.organizations = OrganizationsState::Failed(err.reason.clone());
                ControllerEvent::OrganizationsFailed {
                    notification: Notification::error(err.to_string()),
                }
            }
            Outcome::Requests {
                organization_id,
                generation,
                result,
            } => {
                let current = generation == self.fetch_generation
                    && self.active_organization.as_deref() == Some(organization_id.as_str());
                if !current {
                    debug!(
                        "discarding stale fetch for {} (#{})",
                        organization_id, generation
                    );
                    return ControllerEvent::StaleFetchDiscarded { organization_id };
                }

                self.fetch_task = None;
                match result {
                    Ok(requests) => {
                        let count = requests.len();
                        info!("loaded {} requests for {}", count, organization_id);
                        self.requests = requests;
                        self.requests_state = RequestsState::Loaded;
                        self.has_loaded = true;
                        let requests = &self.requests;
                        self.pending
                            .retain(|id| requests.iter().any(|r| &r.id == id));
                        self.recompute();
                        ControllerEvent::RequestsLoaded {
                            organization_id,
                            count,
                        }
                    }
                    Err(err) => {
                        warn!("{}", err);
                        self.requests_state = RequestsState::Failed(err.reason.clone());
                        ControllerEvent::RequestsFailed {
                            organization_id,
                            notification: Notification::error(err.to_string()),
                        }
                    }
                }
            }
            Outcome::Decision {
                request_id,
                decision,
                result,
            } => {
                self.pending.remove(&request_id);
                match result {
                    Ok(_) => {
                        self.requests.retain(|r| r.id != request_id);
                        self.recompute();
                        ControllerEvent::DecisionApplied {
                            request_id,
                            decision,
                            notification: Notification::decided(decision),
                        }
                    }
                    Err(error) => {
                        warn!("{} {} failed: {}", decision, request_id, error);
                        ControllerEvent::DecisionFailed {
                            request_id,
                            decision,
                            notification: Notification::error(error.to_string()),
                            error,
                        }
                    }
                }
            }
        }
    }

    fn pick_organization(&self, orgs: &[Organization]) -> Option<String> {
        self.preferred_organization
            .as_ref()
            .filter(|preferred| orgs.iter().any(|o| &o.id == *preferred))
            .cloned()
            .or_else(|| orgs.first().map(|o| o.id.clone()))
    }

    fn apply_search(&mut self, text: String) -> ControllerEvent {
        self.applied_search = text.clone();
        self.recompute();
        ControllerEvent::SearchSettled { search_text: text }
    }

    fn recompute(&mut self) {
        self.view = view::derive(&self.requests, &self.applied_search, self.sort_order);
    }

    pub fn requests(&self) -> &[MembershipRequest] {
        &self.requests
    }

    pub fn view_items(&self) -> &[MembershipRequest] {
        &self.view
    }

    /// `NoRequests` only once a fetch has actually succeeded; while loading
    /// or after a failed first fetch there is no empty state to report.
    pub fn empty_state(&self) -> EmptyState {
        if !self.has_loaded {
            return EmptyState::None;
        }
        view::empty_state(&self.requests, &self.view)
    }

    pub fn requests_state(&self) -> &RequestsState {
        &self.requests_state
    }

    /// `NoOrganizations` only for a successful, empty organization fetch.
    pub fn organization_empty_state(&self) -> EmptyState {
        match &self.organizations {
            OrganizationsState::Loaded(orgs) if orgs.is_empty() => EmptyState::NoOrganizations,
            _ => EmptyState::None,
        }
    }

    pub fn organizations(&self) -> &OrganizationsState {
        &self.organizations
    }

    pub fn active_organization(&self) -> Option<&str> {
        self.active_organization.as_deref()
    }

    pub fn search_text(&self) -> &str {
        &self.search_input
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn is_pending(&self, request_id: &str) -> bool {
        self.pending.contains(request_id)
    }

    pub fn pending_action_ids(&self) -> BTreeSet<String> {
        self.pending.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> ViewModel {
        ViewModel {
            view_items: self.view.clone(),
            empty_state: self.empty_state(),
            search_text: self.search_input.clone(),
            applied_search: self.applied_search.clone(),
            sort_order: self.sort_order,
            pending_action_ids: self.pending_action_ids(),
            organizations: self.organizations.clone(),
            organization_empty_state: self.organization_empty_state(),
            active_organization: self.active_organization.clone(),
            requests_state: self.requests_state.clone(),
        }
    }
}

impl Drop for RequestListController {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchTarget;
    use crate::requests::service::{ActionExecutor, OrganizationSource, RequestFetcher};
    use async_trait::async_trait;
    use chrono::DateTime;
    use reqctl_shared::roles::Role;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    type DecisionResult = Result<DecisionAck, ActionError>;

    #[derive(Default)]
    struct FakeBackend {
        organizations: Mutex<Option<Result<Vec<Organization>, FetchError>>>,
        requests: Mutex<HashMap<String, Vec<MembershipRequest>>>,
        request_failures: Mutex<HashMap<String, FetchError>>,
        fetch_gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
        fetched: Mutex<Option<mpsc::UnboundedSender<String>>>,
        decision_gates: Mutex<HashMap<String, oneshot::Receiver<DecisionResult>>>,
        decision_failures: Mutex<HashMap<String, ActionError>>,
    }

    impl FakeBackend {
        fn set_organizations(&self, result: Result<Vec<Organization>, FetchError>) {
            *self.organizations.lock().unwrap() = Some(result);
        }

        fn set_requests(&self, organization_id: &str, requests: Vec<MembershipRequest>) {
            self.requests
                .lock()
                .unwrap()
                .insert(organization_id.to_string(), requests);
        }

        fn fail_requests(&self, organization_id: &str, err: FetchError) {
            self.request_failures
                .lock()
                .unwrap()
                .insert(organization_id.to_string(), err);
        }

        fn gate_fetch(&self, organization_id: &str) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.fetch_gates
                .lock()
                .unwrap()
                .insert(organization_id.to_string(), rx);
            tx
        }

        fn watch_fetches(&self) -> mpsc::UnboundedReceiver<String> {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.fetched.lock().unwrap() = Some(tx);
            rx
        }

        fn gate_decision(&self, request_id: &str) -> oneshot::Sender<DecisionResult> {
            let (tx, rx) = oneshot::channel();
            self.decision_gates
                .lock()
                .unwrap()
                .insert(request_id.to_string(), rx);
            tx
        }

        fn fail_decision(&self, request_id: &str, err: ActionError) {
            self.decision_failures
                .lock()
                .unwrap()
                .insert(request_id.to_string(), err);
        }
    }

    #[async_trait]
    impl OrganizationSource for FakeBackend {
        async fn fetch_organizations(&self) -> Result<Vec<Organization>, FetchError> {
            self.organizations
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[async_trait]
    impl RequestFetcher for FakeBackend {
        async fn fetch_requests(
            &self,
            organization_id: &str,
        ) -> Result<Vec<MembershipRequest>, FetchError> {
            let gate = self.fetch_gates.lock().unwrap().remove(organization_id);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if let Some(tx) = self.fetched.lock().unwrap().as_ref() {
                let _ = tx.send(organization_id.to_string());
            }
            if let Some(err) = self.request_failures.lock().unwrap().get(organization_id) {
                return Err(err.clone());
            }
            Ok(self
                .requests
                .lock()
                .unwrap()
                .get(organization_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    #[async_trait]
    impl ActionExecutor for FakeBackend {
        async fn decide(&self, request_id: &str, _decision: Decision) -> DecisionResult {
            let gate = self.decision_gates.lock().unwrap().remove(request_id);
            if let Some(gate) = gate {
                return gate
                    .await
                    .unwrap_or_else(|_| Err(ActionError::network("gate dropped")));
            }
            if let Some(err) = self.decision_failures.lock().unwrap().get(request_id) {
                return Err(err.clone());
            }
            Ok(ack(request_id))
        }
    }

    fn ack(request_id: &str) -> DecisionAck {
        DecisionAck {
            request_id: request_id.to_string(),
            organization_id: None,
        }
    }

    fn operator(role: Role) -> Operator {
        Operator {
            role,
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
        }
    }

    fn org(id: &str) -> Organization {
        Organization {
            id: id.to_string(),
            name: format!("{id} name"),
        }
    }

    fn req(id: &str, first: &str, last: &str, secs: i64) -> MembershipRequest {
        MembershipRequest {
            id: id.to_string(),
            organization_id: "org-1".to_string(),
            requester_id: Some(format!("user-{id}")),
            requester_first_name: first.to_string(),
            requester_last_name: last.to_string(),
            requested_at: DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    fn ids(items: &[MembershipRequest]) -> Vec<&str> {
        items.iter().map(|r| r.id.as_str()).collect()
    }

    fn controller_with(backend: &Arc<FakeBackend>, options: ControllerOptions) -> RequestListController {
        RequestListController::new(
            &operator(Role::Superadmin),
            Services::from_backend(backend.clone()),
            options,
        )
        .unwrap()
    }

    fn controller(backend: &Arc<FakeBackend>) -> RequestListController {
        controller_with(backend, ControllerOptions::default())
    }

    async fn loaded(backend: &Arc<FakeBackend>, organization_id: &str) -> RequestListController {
        let mut c = controller(backend);
        c.select_organization(organization_id);
        let event = c.next_event().await.unwrap();
        assert!(
            matches!(event, ControllerEvent::RequestsLoaded { .. }),
            "unexpected {event:?}"
        );
        c
    }

    fn john_and_jane() -> Vec<MembershipRequest> {
        vec![req("123", "John", "Doe", 10), req("456", "Jane", "Roe", 20)]
    }

    #[test]
    fn test_non_superadmin_is_denied() {
        let backend = Arc::new(FakeBackend::default());
        for role in [Role::Admin, Role::User] {
            let err = RequestListController::new(
                &operator(role),
                Services::from_backend(backend.clone()),
                ControllerOptions::default(),
            )
            .err()
            .unwrap();
            assert_eq!(err.role, role);
        }
    }

    #[tokio::test]
    async fn test_initial_state() {
        let backend = Arc::new(FakeBackend::default());
        let c = controller(&backend);
        let vm = c.snapshot();
        assert!(vm.view_items.is_empty());
        assert_eq!(vm.empty_state, EmptyState::None);
        assert_eq!(vm.requests_state, RequestsState::Idle);
        assert_eq!(vm.sort_order, SortOrder::NewestFirst);
        assert_eq!(vm.organizations, OrganizationsState::Idle);
        assert_eq!(vm.organization_empty_state, EmptyState::None);
        assert!(vm.pending_action_ids.is_empty());
    }

    #[tokio::test]
    async fn test_no_requests_regardless_of_search() {
        let backend = Arc::new(FakeBackend::default());
        let mut c = loaded(&backend, "org-1").await;
        assert_eq!(c.empty_state(), EmptyState::NoRequests);

        c.set_search_text("x");
        assert!(c.flush_search());
        assert_eq!(c.empty_state(), EmptyState::NoRequests);
    }

    #[tokio::test]
    async fn test_search_hit() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", john_and_jane());
        let mut c = loaded(&backend, "org-1").await;

        c.set_search_text("Jo");
        c.flush_search();
        assert_eq!(ids(c.view_items()), ["123"]);
        assert_eq!(c.empty_state(), EmptyState::None);
    }

    #[tokio::test]
    async fn test_search_miss() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", john_and_jane());
        let mut c = loaded(&backend, "org-1").await;

        c.set_search_text("Zzz");
        c.flush_search();
        assert!(c.view_items().is_empty());
        assert_eq!(c.empty_state(), EmptyState::NoResults);
    }

    #[tokio::test]
    async fn test_sort_toggle() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", john_and_jane());
        let mut c = loaded(&backend, "org-1").await;

        assert_eq!(ids(c.view_items()), ["456", "123"]);
        c.set_sort_order(SortOrder::OldestFirst);
        assert_eq!(ids(c.view_items()), ["123", "456"]);
        c.set_sort_order(SortOrder::NewestFirst);
        assert_eq!(ids(c.view_items()), ["456", "123"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_applies_once_after_quiet_period() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", john_and_jane());
        let mut c = loaded(&backend, "org-1").await;

        let start = Instant::now();
        c.set_search_text("J");
        tokio::time::advance(Duration::from_millis(100)).await;
        c.set_search_text("Jo");

        // raw input is visible immediately, the view is not filtered yet
        assert_eq!(c.search_text(), "Jo");
        assert_eq!(c.view_items().len(), 2);

        let event = c.next_event().await.unwrap();
        assert_eq!(
            event,
            ControllerEvent::SearchSettled {
                search_text: "Jo".to_string()
            }
        );
        assert!(start.elapsed() >= Duration::from_millis(400));
        assert_eq!(ids(c.view_items()), ["123"]);

        let idle = tokio::time::timeout(Duration::from_secs(5), c.next_event()).await;
        assert!(idle.is_err());
    }

    #[tokio::test]
    async fn test_accept_removes_request() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", john_and_jane());
        let mut c = loaded(&backend, "org-1").await;

        assert!(c.submit_decision("456", Decision::Accept));
        assert!(c.is_pending("456"));

        let event = c.next_event().await.unwrap();
        assert_eq!(
            event.notification(),
            Some(&Notification::success(ACCEPTED_MESSAGE))
        );
        assert!(matches!(event, ControllerEvent::DecisionApplied { ref request_id, .. } if request_id == "456"));
        assert_eq!(ids(c.view_items()), ["123"]);
        assert!(c.pending_action_ids().is_empty());
    }

    #[tokio::test]
    async fn test_reject_success_message_differs() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", john_and_jane());
        let mut c = loaded(&backend, "org-1").await;

        c.submit_decision("123", Decision::Reject);
        let event = c.next_event().await.unwrap();
        assert_eq!(
            event.notification(),
            Some(&Notification::success(REJECTED_MESSAGE))
        );
        assert_eq!(ids(c.requests()), ["456"]);
    }

    #[tokio::test]
    async fn test_failed_reject_keeps_request() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", john_and_jane());
        backend.fail_decision("456", ActionError::new("SERVER_ERROR", "try again"));
        let mut c = loaded(&backend, "org-1").await;

        c.submit_decision("456", Decision::Reject);
        let event = c.next_event().await.unwrap();

        match &event {
            ControllerEvent::DecisionFailed { error, notification, .. } => {
                assert_eq!(error.code, "SERVER_ERROR");
                assert_eq!(notification.kind, NotificationKind::Error);
                assert!(notification.message.contains("try again"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(ids(c.view_items()).contains(&"456"));
        assert!(!c.is_pending("456"));

        // manual retry goes through the same path
        assert!(c.submit_decision("456", Decision::Reject));
    }

    #[tokio::test]
    async fn test_submit_guards_are_no_ops() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", john_and_jane());
        let _gate = backend.gate_decision("456");
        let mut c = loaded(&backend, "org-1").await;

        assert!(!c.submit_decision("999", Decision::Accept));
        assert!(c.submit_decision("456", Decision::Accept));
        assert!(!c.submit_decision("456", Decision::Reject));
        assert_eq!(c.pending_action_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_completion() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests(
            "org-1",
            vec![req("A", "Ann", "A", 1), req("B", "Bob", "B", 2), req("C", "Cid", "C", 3)],
        );
        let gate_a = backend.gate_decision("A");
        let gate_b = backend.gate_decision("B");
        let mut c = loaded(&backend, "org-1").await;

        assert!(c.submit_decision("A", Decision::Accept));
        assert!(c.submit_decision("B", Decision::Reject));
        assert_eq!(
            c.pending_action_ids().into_iter().collect::<Vec<_>>(),
            ["A", "B"]
        );

        gate_b.send(Ok(ack("B"))).unwrap();
        let event = c.next_event().await.unwrap();
        assert!(matches!(event, ControllerEvent::DecisionApplied { ref request_id, .. } if request_id == "B"));
        assert!(c.is_pending("A"));
        assert!(!c.is_pending("B"));

        gate_a.send(Ok(ack("A"))).unwrap();
        let event = c.next_event().await.unwrap();
        assert!(matches!(event, ControllerEvent::DecisionApplied { ref request_id, .. } if request_id == "A"));

        assert_eq!(ids(c.view_items()), ["C"]);
        assert!(c.pending_action_ids().is_empty());
    }

    #[tokio::test]
    async fn test_refetch_drops_pending_for_vanished_requests() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", john_and_jane());
        let gate = backend.gate_decision("456");
        let mut c = loaded(&backend, "org-1").await;

        c.submit_decision("456", Decision::Accept);
        backend.set_requests("org-1", vec![req("123", "John", "Doe", 10)]);
        c.refresh();
        let event = c.next_event().await.unwrap();
        assert!(matches!(event, ControllerEvent::RequestsLoaded { count: 1, .. }));
        assert!(c.pending_action_ids().is_empty());

        gate.send(Ok(ack("456"))).unwrap();
        let event = c.next_event().await.unwrap();
        assert!(matches!(event, ControllerEvent::DecisionApplied { .. }));
        assert_eq!(ids(c.requests()), ["123"]);
        assert!(c.pending_action_ids().is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_requests() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", john_and_jane());
        let mut c = loaded(&backend, "org-1").await;

        backend.fail_requests("org-1", FetchError::new(FetchTarget::Requests, "offline"));
        c.refresh();
        let event = c.next_event().await.unwrap();
        match &event {
            ControllerEvent::RequestsFailed { notification, .. } => {
                assert_eq!(notification.kind, NotificationKind::Error);
                assert!(notification.message.contains("offline"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(c.requests().len(), 2);
        assert_eq!(
            c.snapshot().requests_state,
            RequestsState::Failed("offline".to_string())
        );
        assert_eq!(c.empty_state(), EmptyState::None);
    }

    #[tokio::test]
    async fn test_failed_first_fetch_is_not_empty() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_requests("org-1", FetchError::new(FetchTarget::Requests, "offline"));
        let mut c = controller(&backend);

        c.select_organization("org-1");
        assert_eq!(c.requests_state(), &RequestsState::Loading);
        assert_eq!(c.empty_state(), EmptyState::None);

        let event = c.next_event().await.unwrap();
        assert!(matches!(event, ControllerEvent::RequestsFailed { .. }));
        let vm = c.snapshot();
        assert_eq!(vm.requests_state, RequestsState::Failed("offline".to_string()));
        assert_eq!(vm.empty_state, EmptyState::None);
    }

    #[tokio::test]
    async fn test_late_result_for_superseded_organization_is_discarded() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", vec![req("1", "Old", "Org", 1)]);
        backend.set_requests("org-2", vec![req("2", "New", "Org", 2), req("3", "New", "Org", 3)]);
        let mut fetched = backend.watch_fetches();
        let mut c = controller(&backend);

        c.select_organization("org-1");
        // the org-1 outcome is queued before org-2 is selected
        assert_eq!(fetched.recv().await.as_deref(), Some("org-1"));
        c.select_organization("org-2");

        let event = c.next_event().await.unwrap();
        assert_eq!(
            event,
            ControllerEvent::StaleFetchDiscarded {
                organization_id: "org-1".to_string()
            }
        );
        assert!(c.requests().is_empty());

        let event = c.next_event().await.unwrap();
        assert_eq!(
            event,
            ControllerEvent::RequestsLoaded {
                organization_id: "org-2".to_string(),
                count: 2
            }
        );
        assert_eq!(c.active_organization(), Some("org-2"));
        assert_eq!(ids(c.view_items()), ["3", "2"]);
    }

    #[tokio::test]
    async fn test_in_flight_fetch_is_superseded() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", vec![req("1", "Old", "Org", 1)]);
        backend.set_requests("org-2", vec![req("2", "New", "Org", 2)]);
        let gate = backend.gate_fetch("org-1");
        let mut c = controller(&backend);

        c.select_organization("org-1");
        c.select_organization("org-2");
        let event = c.next_event().await.unwrap();
        assert!(matches!(event, ControllerEvent::RequestsLoaded { ref organization_id, .. } if organization_id == "org-2"));

        let _ = gate.send(());
        tokio::task::yield_now().await;
        let late = tokio::time::timeout(Duration::from_millis(50), c.next_event()).await;
        assert!(late.is_err(), "aborted fetch reported {late:?}");
        assert_eq!(ids(c.requests()), ["2"]);
        assert_eq!(c.active_organization(), Some("org-2"));
    }

    #[tokio::test]
    async fn test_teardown_blocks_late_results() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_requests("org-1", john_and_jane());
        let gate = backend.gate_decision("456");
        let mut c = loaded(&backend, "org-1").await;

        c.submit_decision("456", Decision::Accept);
        c.teardown();
        let _ = gate.send(Ok(ack("456")));

        assert!(c.is_torn_down());
        assert!(c.next_event().await.is_none());
        assert_eq!(c.requests().len(), 2);
        assert!(!c.submit_decision("123", Decision::Accept));
    }

    #[tokio::test]
    async fn test_empty_organization_list() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_organizations(Ok(Vec::new()));
        let mut c = controller(&backend);

        c.load_organizations();
        assert_eq!(c.organizations(), &OrganizationsState::Loading);
        assert_eq!(c.organization_empty_state(), EmptyState::None);

        let event = c.next_event().await.unwrap();
        assert_eq!(event, ControllerEvent::OrganizationsLoaded { count: 0 });
        assert_eq!(c.organization_empty_state(), EmptyState::NoOrganizations);
        assert_ne!(c.organization_empty_state(), c.empty_state());
        assert_eq!(c.active_organization(), None);
    }

    #[tokio::test]
    async fn test_failed_organization_fetch_is_not_empty_state() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_organizations(Err(FetchError::new(FetchTarget::Organizations, "boom")));
        let mut c = controller(&backend);

        c.load_organizations();
        let event = c.next_event().await.unwrap();
        assert!(event.notification().is_some());
        assert_eq!(c.organizations(), &OrganizationsState::Failed("boom".to_string()));
        assert_eq!(c.organization_empty_state(), EmptyState::None);
    }

    #[tokio::test]
    async fn test_preferred_organization_is_selected() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_organizations(Ok(vec![org("org-1"), org("org-2")]));
        backend.set_requests("org-2", john_and_jane());
        let mut c = controller_with(
            &backend,
            ControllerOptions {
                preferred_organization: Some("org-2".to_string()),
                ..Default::default()
            },
        );

        c.load_organizations();
        assert_eq!(
            c.next_event().await.unwrap(),
            ControllerEvent::OrganizationsLoaded { count: 2 }
        );
        assert_eq!(c.active_organization(), Some("org-2"));
        assert_eq!(c.snapshot().requests_state, RequestsState::Loading);

        assert_eq!(
            c.next_event().await.unwrap(),
            ControllerEvent::RequestsLoaded {
                organization_id: "org-2".to_string(),
                count: 2
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_preference_falls_back_to_first() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_organizations(Ok(vec![org("org-1"), org("org-2")]));
        let mut c = controller_with(
            &backend,
            ControllerOptions {
                preferred_organization: Some("gone".to_string()),
                ..Default::default()
            },
        );

        c.load_organizations();
        c.next_event().await.unwrap();
        assert_eq!(c.active_organization(), Some("org-1"));
    }
}
