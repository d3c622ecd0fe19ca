pub mod controller;
pub mod debounce;
pub mod service;
pub mod view;

pub use controller::{
    ACCEPTED_MESSAGE, ControllerEvent, ControllerOptions, Notification, NotificationKind,
    OrganizationsState, REJECTED_MESSAGE, RequestListController, RequestsState, ViewModel,
};
pub use service::{ActionExecutor, OrganizationSource, RequestFetcher, Services};
pub use view::{EmptyState, SortOrder};
