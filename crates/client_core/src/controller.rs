//! Lead list state machine: filters, pagination, selection and its
//! reconciliation with the leads backend.

use std::{
    collections::HashSet,
    sync::{Arc, Weak},
    time::Duration,
};

use futures::FutureExt;
use shared::{
    domain::{Lead, LeadId, StatusField, SystemStatus},
    filter::{filter_leads, Filter, FilterSet},
    pagination::{page_count, paginate, PaginationState, DEFAULT_PAGE_LIMIT},
    protocol::{
        CallingConfiguration, LeadPage, LeadQuery, ResetLeadsRequest, SelectByStatusRequest,
        StartCallsRequest,
    },
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    api::{ApiResult, LeadsApi},
    error::LeadsError,
    feedback::{Confirmer, DenyConfirm, LogNotifier, NoticeLevel, Notifier},
    inflight::Inflight,
    status::{StatusPoller, StatusThrottle, STATUS_MIN_INTERVAL},
};

pub const SELECT_BATCH_SIZE: usize = 100;
/// Selecting more batches than this needs human confirmation.
pub const CONFIRM_BATCH_THRESHOLD: usize = 50;
pub const DEFAULT_DISPLAY_PAGE_SIZE: usize = 15;
pub const DEFAULT_MAX_CONCURRENT_CALLS: u32 = 3;
/// The background poller reloads leads once per this many status polls.
pub const LEAD_REFRESH_TICKS: u64 = 2;

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub page_limit: u64,
    /// Rows per page in the rendered table.
    pub display_page_size: usize,
    pub select_batch_size: usize,
    pub confirm_batch_threshold: usize,
    pub status_min_interval: Duration,
    pub max_concurrent_calls: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            display_page_size: DEFAULT_DISPLAY_PAGE_SIZE,
            select_batch_size: SELECT_BATCH_SIZE,
            confirm_batch_threshold: CONFIRM_BATCH_THRESHOLD,
            status_min_interval: STATUS_MIN_INTERVAL,
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
        }
    }
}

/// Changes a rendering layer can react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    LeadsLoaded { count: usize, total: u64 },
    SelectionChanged { selected: usize },
    StatusUpdated(SystemStatus),
}

#[derive(Debug, Clone, Default)]
pub struct LeadListState {
    pub leads: Vec<Lead>,
    pub filters: FilterSet,
    pub pagination: PaginationState,
    /// 1-based page of the filtered list shown in the table.
    pub display_page: usize,
}

impl LeadListState {
    fn new(page_limit: u64) -> Self {
        Self {
            leads: Vec::new(),
            filters: FilterSet::default(),
            pagination: PaginationState::with_limit(page_limit),
            display_page: 1,
        }
    }

    pub fn query(&self) -> LeadQuery {
        LeadQuery::new(self.filters.clone(), self.pagination)
    }

    fn selected_count(&self) -> usize {
        self.leads
            .iter()
            .filter(|lead| lead.selected_for_calling)
            .count()
    }
}

/// Tri-state of the "select all visible rows" checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterCheckbox {
    Unchecked,
    Indeterminate,
    Checked,
}

#[derive(Debug, Clone)]
pub struct LeadListView {
    pub rows: Vec<Lead>,
    pub page: usize,
    pub page_count: usize,
    pub filtered_total: usize,
    pub selected_count: usize,
    pub pagination: PaginationState,
    pub master: MasterCheckbox,
}

#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub max_concurrent: Option<u32>,
    /// Route every call to `override_phone` instead of the lead's number.
    pub test_mode: bool,
    pub override_phone: Option<String>,
}

pub struct LeadListController {
    api: Arc<dyn LeadsApi>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    settings: ControllerSettings,
    state: Arc<Mutex<LeadListState>>,
    loads: Inflight<LeadQuery, ApiResult<LeadPage>>,
    status: StatusThrottle,
    events: broadcast::Sender<ControllerEvent>,
}

fn report(notifier: &dyn Notifier, context: &str, err: &LeadsError) {
    if err.is_user_facing() {
        notifier.notify(NoticeLevel::Error, &format!("{context}: {err}"));
    } else {
        warn!(error = %err, "{context}: feature not available");
    }
}

impl LeadListController {
    pub fn new(api: Arc<dyn LeadsApi>) -> Arc<Self> {
        Self::new_with_dependencies(
            api,
            Arc::new(LogNotifier),
            Arc::new(DenyConfirm),
            ControllerSettings::default(),
        )
    }

    pub fn new_with_dependencies(
        api: Arc<dyn LeadsApi>,
        notifier: Arc<dyn Notifier>,
        confirmer: Arc<dyn Confirmer>,
        settings: ControllerSettings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            notifier,
            confirmer,
            state: Arc::new(Mutex::new(LeadListState::new(settings.page_limit))),
            loads: Inflight::new(),
            status: StatusThrottle::new(settings.status_min_interval),
            settings,
            events,
        })
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    // ---------------- Loading ----------------

    pub async fn load_leads(&self) -> ApiResult<LeadPage> {
        let query = self.state.lock().await.query();
        self.load(query).await
    }

    /// Fetches `query` and, if it is still the current query when the
    /// response arrives, replaces the local list and totals with it.
    /// Identical concurrent loads share one request.
    pub async fn load(&self, query: LeadQuery) -> ApiResult<LeadPage> {
        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        let notifier = Arc::clone(&self.notifier);
        let events = self.events.clone();
        let display_page_size = self.settings.display_page_size;
        let key = query.clone();

        self.loads
            .run(key, move || {
                async move {
                    debug!(
                        limit = query.limit,
                        offset = query.offset,
                        filters = query.filters.active_constraints(),
                        "leads: loading"
                    );
                    let page = match api.list_leads(&query).await {
                        Ok(page) => page,
                        Err(err) => {
                            report(notifier.as_ref(), "Failed to load leads", &err);
                            return Err(err);
                        }
                    };

                    let mut guard = state.lock().await;
                    if guard.query() != query {
                        debug!("leads: discarding response for a superseded query");
                        return Ok(page);
                    }
                    guard.leads = page.leads.clone();
                    guard.pagination.total = page.pagination.total;
                    let filtered = filter_leads(&guard.leads, &guard.filters).len();
                    let pages = page_count(filtered, display_page_size).max(1);
                    guard.display_page = guard.display_page.clamp(1, pages);
                    let count = guard.leads.len();
                    drop(guard);

                    info!(count, total = page.pagination.total, "leads: loaded");
                    let _ = events.send(ControllerEvent::LeadsLoaded {
                        count,
                        total: page.pagination.total,
                    });
                    Ok(page)
                }
                .boxed()
            })
            .await
    }

    // ---------------- Filters & pagination ----------------

    pub async fn set_filter(&self, filter: Filter) -> ApiResult<LeadPage> {
        {
            let mut guard = self.state.lock().await;
            debug!(key = ?filter.key(), "leads: filter changed");
            guard.filters.apply(filter);
            guard.pagination.reset();
            guard.display_page = 1;
        }
        self.load_leads().await
    }

    pub async fn set_filters(
        &self,
        filters: impl IntoIterator<Item = Filter>,
    ) -> ApiResult<LeadPage> {
        self.set_filters_at_page(filters, 1).await
    }

    /// Applies `filters` and jumps to server page `page` with a single
    /// load.
    pub async fn set_filters_at_page(
        &self,
        filters: impl IntoIterator<Item = Filter>,
        page: u64,
    ) -> ApiResult<LeadPage> {
        {
            let mut guard = self.state.lock().await;
            for filter in filters {
                guard.filters.apply(filter);
            }
            guard.pagination.go_to_page(page);
            guard.display_page = 1;
        }
        self.load_leads().await
    }

    /// Untyped variant of [`set_filter`](Self::set_filter). Unknown keys are
    /// ignored and return `Ok(None)` without touching state.
    pub async fn set_filter_raw(&self, key: &str, value: &str) -> ApiResult<Option<LeadPage>> {
        match Filter::parse(key, value) {
            Some(filter) => self.set_filter(filter).await.map(Some),
            None => {
                debug!(key, "leads: ignoring unknown filter key");
                Ok(None)
            }
        }
    }

    pub async fn clear_filters(&self) -> ApiResult<LeadPage> {
        {
            let mut guard = self.state.lock().await;
            guard.filters = FilterSet::default();
            guard.pagination = PaginationState::with_limit(self.settings.page_limit);
            guard.display_page = 1;
        }
        self.load_leads().await
    }

    pub async fn go_to_page(&self, page: u64) -> ApiResult<LeadPage> {
        {
            let mut guard = self.state.lock().await;
            guard.pagination.go_to_page(page);
            guard.display_page = 1;
        }
        self.load_leads().await
    }

    /// Changes the table page without reloading; clamped to the filtered
    /// list.
    pub async fn set_display_page(&self, page: usize) -> usize {
        let mut guard = self.state.lock().await;
        let filtered = filter_leads(&guard.leads, &guard.filters).len();
        let pages = page_count(filtered, self.settings.display_page_size).max(1);
        guard.display_page = page.clamp(1, pages);
        guard.display_page
    }

    // ---------------- Views ----------------

    pub async fn filtered_leads(&self) -> Vec<Lead> {
        let guard = self.state.lock().await;
        filter_leads(&guard.leads, &guard.filters)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn selected_count(&self) -> usize {
        self.state.lock().await.selected_count()
    }

    pub async fn selected_lead_ids(&self) -> Vec<LeadId> {
        self.state
            .lock()
            .await
            .leads
            .iter()
            .filter(|lead| lead.selected_for_calling)
            .map(|lead| lead.id)
            .collect()
    }

    pub async fn filters(&self) -> FilterSet {
        self.state.lock().await.filters.clone()
    }

    pub async fn pagination(&self) -> PaginationState {
        self.state.lock().await.pagination
    }

    pub async fn snapshot(&self) -> LeadListState {
        self.state.lock().await.clone()
    }

    pub async fn view(&self) -> LeadListView {
        let guard = self.state.lock().await;
        let filtered = filter_leads(&guard.leads, &guard.filters);
        let page_size = self.settings.display_page_size;
        let rows: Vec<Lead> = paginate(&filtered, guard.display_page, page_size)
            .iter()
            .map(|lead| (*lead).clone())
            .collect();
        let checked = rows.iter().filter(|lead| lead.selected_for_calling).count();
        let master = match checked {
            0 => MasterCheckbox::Unchecked,
            n if n == rows.len() => MasterCheckbox::Checked,
            _ => MasterCheckbox::Indeterminate,
        };

        LeadListView {
            page: guard.display_page,
            page_count: page_count(filtered.len(), page_size),
            filtered_total: filtered.len(),
            selected_count: guard.selected_count(),
            pagination: guard.pagination,
            master,
            rows,
        }
    }

    // ---------------- Selection ----------------

    /// Flips the local flag immediately and pushes it to the server in the
    /// background. A failed push is logged; the local flag is kept.
    ///
    /// Returns `None` when the lead is not in the current list.
    pub async fn toggle_selection(&self, lead_id: LeadId, selected: bool) -> Option<JoinHandle<()>> {
        let selected_count = {
            let mut guard = self.state.lock().await;
            let lead = guard.leads.iter_mut().find(|lead| lead.id == lead_id)?;
            lead.selected_for_calling = selected;
            guard.selected_count()
        };
        self.emit(ControllerEvent::SelectionChanged {
            selected: selected_count,
        });

        let api = Arc::clone(&self.api);
        Some(tokio::spawn(async move {
            if let Err(err) = api.mark_leads(&[lead_id], selected).await {
                warn!(
                    lead_id = lead_id.0,
                    selected,
                    error = %err,
                    "selection: server update failed; local state kept"
                );
            }
        }))
    }

    /// Selects or deselects every lead matching the current filters (not
    /// only the visible page), in batches. Each batch is applied locally once
    /// the server acknowledges it.
    ///
    /// Returns the number of leads updated, or `Ok(0)` if the user declined
    /// the confirmation for a large selection.
    pub async fn select_all_filtered(&self, selected: bool) -> ApiResult<usize> {
        let ids: Vec<LeadId> = {
            let guard = self.state.lock().await;
            filter_leads(&guard.leads, &guard.filters)
                .iter()
                .map(|lead| lead.id)
                .collect()
        };

        if ids.is_empty() {
            self.notifier
                .notify(NoticeLevel::Info, "No leads match the current filters");
            return Ok(0);
        }

        let batch_size = self.settings.select_batch_size.max(1);
        let batches: Vec<&[LeadId]> = ids.chunks(batch_size).collect();

        if selected && batches.len() > self.settings.confirm_batch_threshold {
            let message = format!(
                "{} leads will be selected in {} requests. Continue?",
                ids.len(),
                batches.len()
            );
            if !self.confirmer.confirm("Select leads", &message).await {
                info!(leads = ids.len(), "selection: bulk selection cancelled by user");
                return Ok(0);
            }
        }

        let mut applied = 0usize;
        for (index, batch) in batches.iter().enumerate() {
            match self.api.mark_leads(batch, selected).await {
                Ok(updated) => {
                    debug!(
                        batch = index + 1,
                        batches = batches.len(),
                        updated,
                        "selection: batch acknowledged"
                    );
                    self.apply_selection(batch, selected).await;
                    applied += batch.len();
                }
                Err(err) => {
                    report(
                        self.notifier.as_ref(),
                        &format!("Selection stopped after {applied} of {} leads", ids.len()),
                        &err,
                    );
                    self.emit_selection().await;
                    return Err(err);
                }
            }
        }

        self.emit_selection().await;
        let verb = if selected { "selected" } else { "deselected" };
        self.notifier
            .notify(NoticeLevel::Success, &format!("{applied} leads {verb}"));
        Ok(applied)
    }

    /// Clears the selection of every lead on the server regardless of
    /// filters, then reloads. Returns how many local leads were selected.
    pub async fn deselect_all(&self) -> ApiResult<usize> {
        if let Err(err) = self.api.deselect_all().await {
            report(self.notifier.as_ref(), "Failed to deselect leads", &err);
            return Err(err);
        }

        let cleared = {
            let mut guard = self.state.lock().await;
            let cleared = guard.selected_count();
            guard
                .leads
                .iter_mut()
                .for_each(|lead| lead.selected_for_calling = false);
            cleared
        };
        self.emit(ControllerEvent::SelectionChanged { selected: 0 });
        self.notifier
            .notify(NoticeLevel::Success, "All leads deselected");
        info!(cleared, "selection: deselected all leads");

        self.reload_after_change().await;
        Ok(cleared)
    }

    /// Server-side bulk selection of every lead whose status column equals
    /// `value`, optionally limited to one origin file.
    pub async fn select_by_status(
        &self,
        field: StatusField,
        value: &str,
        origin_file: Option<&str>,
        selected: bool,
    ) -> ApiResult<u64> {
        let value = value.trim();
        if value.is_empty() {
            return Err(LeadsError::Invalid("status value must not be empty".into()));
        }

        let request = SelectByStatusRequest {
            status_field: field,
            status_value: value.to_string(),
            archivo_origen: origin_file
                .map(str::trim)
                .filter(|file| !file.is_empty())
                .map(str::to_string),
            selected,
        };
        let count = match self.api.select_by_status(&request).await {
            Ok(count) => count,
            Err(err) => {
                report(self.notifier.as_ref(), "Failed to select by status", &err);
                return Err(err);
            }
        };

        let verb = if selected { "selected" } else { "deselected" };
        self.notifier.notify(
            NoticeLevel::Success,
            &format!("{count} leads with '{value}' {verb}"),
        );
        self.reload_after_change().await;
        Ok(count)
    }

    /// Resets call status (and optionally attempts/selection) of every lead
    /// after confirmation. Returns `false` if the user declined.
    pub async fn reset_leads(&self, reset_attempts: bool, reset_selection: bool) -> ApiResult<bool> {
        let confirmed = self
            .confirmer
            .confirm(
                "Reset leads",
                "The call status of every lead will be reset. Continue?",
            )
            .await;
        if !confirmed {
            return Ok(false);
        }

        let request = ResetLeadsRequest {
            lead_ids: None,
            reset_attempts,
            reset_selection,
        };
        match self.api.reset_leads(&request).await {
            Ok(updated) => {
                info!(?updated, reset_attempts, reset_selection, "leads: reset");
                self.notifier.notify(NoticeLevel::Success, "Leads reset");
            }
            Err(err) => {
                report(self.notifier.as_ref(), "Failed to reset leads", &err);
                return Err(err);
            }
        }
        self.reload_after_change().await;
        Ok(true)
    }

    async fn apply_selection(&self, ids: &[LeadId], selected: bool) {
        let ids: HashSet<LeadId> = ids.iter().copied().collect();
        let mut guard = self.state.lock().await;
        for lead in guard.leads.iter_mut().filter(|lead| ids.contains(&lead.id)) {
            lead.selected_for_calling = selected;
        }
    }

    async fn emit_selection(&self) {
        let selected = self.selected_count().await;
        self.emit(ControllerEvent::SelectionChanged { selected });
    }

    async fn reload_after_change(&self) {
        if let Err(err) = self.load_leads().await {
            debug!(error = %err, "leads: reload after change failed");
        }
    }

    // ---------------- Calling engine ----------------

    /// Calling-engine status, fetched at most once per
    /// [`ControllerSettings::status_min_interval`].
    pub async fn get_status(&self) -> ApiResult<SystemStatus> {
        let status = self.status.get(Arc::clone(&self.api)).await?;
        self.emit(ControllerEvent::StatusUpdated(status));
        Ok(status)
    }

    pub fn last_known_status(&self) -> Option<SystemStatus> {
        self.status.last_known()
    }

    pub async fn start_calling(&self, options: StartOptions) -> ApiResult<()> {
        let selected = self.selected_lead_ids().await;
        if selected.is_empty() {
            self.notifier.notify(
                NoticeLevel::Warning,
                "Select at least one lead before starting calls",
            );
            return Err(LeadsError::NothingSelected);
        }

        let override_phone = if options.test_mode {
            let phone = options
                .override_phone
                .map(|phone| phone.trim().to_string())
                .filter(|phone| !phone.is_empty());
            if phone.is_none() {
                self.notifier.notify(
                    NoticeLevel::Warning,
                    "Enter a phone number to use test mode",
                );
                return Err(LeadsError::Invalid(
                    "test mode requires an override phone".into(),
                ));
            }
            phone
        } else {
            None
        };

        let request = StartCallsRequest {
            max_concurrent: options
                .max_concurrent
                .unwrap_or(self.settings.max_concurrent_calls),
            selected_leads: selected,
            override_phone,
        };
        if let Err(err) = self.api.start_calls(&request).await {
            report(self.notifier.as_ref(), "Failed to start calls", &err);
            return Err(err);
        }

        self.status.invalidate();
        info!(
            leads = request.selected_leads.len(),
            max_concurrent = request.max_concurrent,
            test_mode = request.override_phone.is_some(),
            "calls: started"
        );
        self.notifier
            .notify(NoticeLevel::Success, "Calling system started");
        Ok(())
    }

    pub async fn stop_calling(&self) -> ApiResult<()> {
        if let Err(err) = self.api.stop_calls().await {
            report(self.notifier.as_ref(), "Failed to stop calls", &err);
            return Err(err);
        }
        self.status.invalidate();
        info!("calls: stopped");
        self.notifier
            .notify(NoticeLevel::Info, "Calling system stopped");
        Ok(())
    }

    pub async fn configuration(&self) -> ApiResult<CallingConfiguration> {
        self.api.configuration().await
    }

    pub async fn save_configuration(&self, config: CallingConfiguration) -> ApiResult<()> {
        if config.max_concurrent_calls == 0 {
            return Err(LeadsError::Invalid(
                "max concurrent calls must be at least 1".into(),
            ));
        }
        if let Err(err) = self.api.save_configuration(&config).await {
            report(self.notifier.as_ref(), "Failed to save configuration", &err);
            return Err(err);
        }
        self.notifier
            .notify(NoticeLevel::Success, "Configuration saved");
        Ok(())
    }

    pub async fn test_connection(&self) -> ApiResult<bool> {
        match self.api.test_connection().await {
            Ok(true) => {
                self.notifier
                    .notify(NoticeLevel::Success, "Telephony provider reachable");
                Ok(true)
            }
            Ok(false) => {
                self.notifier
                    .notify(NoticeLevel::Error, "Telephony provider unreachable");
                Ok(false)
            }
            Err(err) => {
                report(self.notifier.as_ref(), "Connection test failed", &err);
                Err(err)
            }
        }
    }

    /// Polls [`get_status`](Self::get_status) every `every` and reloads the
    /// current lead page every [`LEAD_REFRESH_TICKS`] polls, until the
    /// returned handle is dropped or the controller goes away.
    pub fn spawn_status_poller(self: &Arc<Self>, every: Duration) -> StatusPoller {
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks: u64 = 0;
            loop {
                ticker.tick().await;
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                if let Err(err) = controller.get_status().await {
                    warn!(error = %err, "status: poll failed");
                }
                if ticks > 0 && ticks % LEAD_REFRESH_TICKS == 0 {
                    if let Err(err) = controller.load_leads().await {
                        debug!(error = %err, "leads: periodic refresh failed");
                    }
                }
                ticks += 1;
            }
            debug!("status: poller finished");
        });
        StatusPoller::new(task)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
