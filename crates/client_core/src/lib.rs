//! Client side of the lead calling dashboard: the REST client for the
//! `/api/calls` backend and the controller that keeps the lead list,
//! filters, pagination and selection in sync with it.

pub mod api;
pub mod controller;
pub mod error;
pub mod feedback;
pub mod http;
pub mod inflight;
pub mod status;

pub use api::{ApiResult, LeadsApi};
pub use controller::{
    ControllerEvent, ControllerSettings, LeadListController, LeadListState, LeadListView,
    MasterCheckbox, StartOptions,
};
pub use error::LeadsError;
pub use feedback::{AutoConfirm, Confirmer, DenyConfirm, LogNotifier, NoticeLevel, Notifier};
pub use http::HttpLeadsApi;
pub use status::{StatusPoller, StatusThrottle};
