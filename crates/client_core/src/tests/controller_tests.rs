use super::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex as StdMutex,
};

use async_trait::async_trait;
use shared::domain::CallStats;
use tokio::sync::oneshot;

#[derive(Default)]
struct FakeLeadsApi {
    store: StdMutex<Vec<Lead>>,
    list_calls: AtomicUsize,
    list_gate: StdMutex<Option<oneshot::Receiver<()>>>,
    fail_list: StdMutex<Option<LeadsError>>,
    marks: StdMutex<Vec<(Vec<LeadId>, bool)>>,
    fail_mark_on_call: StdMutex<Option<usize>>,
    deselect_calls: AtomicUsize,
    by_status: StdMutex<Vec<SelectByStatusRequest>>,
    resets: StdMutex<Vec<ResetLeadsRequest>>,
    status_calls: AtomicUsize,
    status_gate: StdMutex<Option<oneshot::Receiver<()>>>,
    fail_status: StdMutex<Option<LeadsError>>,
    starts: StdMutex<Vec<StartCallsRequest>>,
    stops: AtomicUsize,
}

impl FakeLeadsApi {
    fn with_leads(leads: Vec<Lead>) -> Arc<Self> {
        let api = Self::default();
        *api.store.lock().expect("store") = leads;
        Arc::new(api)
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn marks(&self) -> Vec<(Vec<LeadId>, bool)> {
        self.marks.lock().expect("marks").clone()
    }
}

#[async_trait]
impl LeadsApi for FakeLeadsApi {
    async fn list_leads(&self, query: &LeadQuery) -> ApiResult<LeadPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gate.lock().expect("gate").take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        tokio::task::yield_now().await;
        if let Some(err) = self.fail_list.lock().expect("fail").clone() {
            return Err(err);
        }

        let store = self.store.lock().expect("store");
        let matching: Vec<Lead> = store
            .iter()
            .filter(|lead| query.filters.matches(lead))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let leads = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok(LeadPage {
            leads,
            pagination: PaginationState {
                total,
                limit: query.limit,
                offset: query.offset,
            },
        })
    }

    async fn mark_leads(&self, lead_ids: &[LeadId], selected: bool) -> ApiResult<u64> {
        let call = {
            let mut marks = self.marks.lock().expect("marks");
            marks.push((lead_ids.to_vec(), selected));
            marks.len()
        };
        if *self.fail_mark_on_call.lock().expect("fail") == Some(call) {
            return Err(LeadsError::Server {
                status: 500,
                message: "selection failed".into(),
            });
        }
        let mut store = self.store.lock().expect("store");
        for lead in store.iter_mut().filter(|lead| lead_ids.contains(&lead.id)) {
            lead.selected_for_calling = selected;
        }
        Ok(lead_ids.len() as u64)
    }

    async fn select_by_status(&self, request: &SelectByStatusRequest) -> ApiResult<u64> {
        self.by_status.lock().expect("by status").push(request.clone());
        let mut store = self.store.lock().expect("store");
        let mut count = 0;
        for lead in store.iter_mut() {
            let value = match request.status_field {
                StatusField::StatusLevel1 => lead.status_level_1.as_deref(),
                StatusField::StatusLevel2 => lead.status_level_2.as_deref(),
            };
            if value == Some(request.status_value.as_str()) {
                lead.selected_for_calling = request.selected;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn deselect_all(&self) -> ApiResult<()> {
        self.deselect_calls.fetch_add(1, Ordering::SeqCst);
        for lead in self.store.lock().expect("store").iter_mut() {
            lead.selected_for_calling = false;
        }
        Ok(())
    }

    async fn reset_leads(&self, request: &ResetLeadsRequest) -> ApiResult<Option<u64>> {
        self.resets.lock().expect("resets").push(request.clone());
        Ok(Some(self.store.lock().expect("store").len() as u64))
    }

    async fn status(&self) -> ApiResult<SystemStatus> {
        let calls = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let gate = self.status_gate.lock().expect("gate").take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(err) = self.fail_status.lock().expect("fail").clone() {
            return Err(err);
        }
        Ok(SystemStatus {
            is_running: calls % 2 == 0,
            stats: CallStats {
                total: calls as u64,
                ..CallStats::default()
            },
        })
    }

    async fn start_calls(&self, request: &StartCallsRequest) -> ApiResult<()> {
        self.starts.lock().expect("starts").push(request.clone());
        Ok(())
    }

    async fn stop_calls(&self) -> ApiResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn configuration(&self) -> ApiResult<CallingConfiguration> {
        Ok(CallingConfiguration::default())
    }

    async fn save_configuration(&self, _config: &CallingConfiguration) -> ApiResult<()> {
        Ok(())
    }

    async fn test_connection(&self) -> ApiResult<bool> {
        Err(LeadsError::NotAvailable {
            endpoint: "test/connection".into(),
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notices: StdMutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    fn count(&self, level: NoticeLevel) -> usize {
        self.notices
            .lock()
            .expect("notices")
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices
            .lock()
            .expect("notices")
            .push((level, message.to_string()));
    }
}

struct CountingConfirmer {
    answer: bool,
    calls: AtomicUsize,
}

impl CountingConfirmer {
    fn answering(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Confirmer for CountingConfirmer {
    async fn confirm(&self, _title: &str, _message: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

struct Harness {
    api: Arc<FakeLeadsApi>,
    notifier: Arc<RecordingNotifier>,
    confirmer: Arc<CountingConfirmer>,
    controller: Arc<LeadListController>,
}

fn harness_with(leads: Vec<Lead>, confirm: bool, settings: ControllerSettings) -> Harness {
    let api = FakeLeadsApi::with_leads(leads);
    let notifier = Arc::new(RecordingNotifier::default());
    let confirmer = CountingConfirmer::answering(confirm);
    let controller = LeadListController::new_with_dependencies(
        api.clone(),
        notifier.clone(),
        confirmer.clone(),
        settings,
    );
    Harness {
        api,
        notifier,
        confirmer,
        controller,
    }
}

fn harness(leads: Vec<Lead>) -> Harness {
    harness_with(leads, true, ControllerSettings::default())
}

fn lead(id: i64, estado1: &str) -> Lead {
    let mut lead = Lead::new(LeadId(id));
    lead.status_level_1 = Some(estado1.to_string());
    lead
}

fn ids(leads: &[Lead]) -> Vec<i64> {
    leads.iter().map(|lead| lead.id.0).collect()
}

#[tokio::test]
async fn load_replaces_list_and_totals() {
    let h = harness(vec![lead(1, "A"), lead(2, "B")]);
    let mut events = h.controller.subscribe_events();

    let page = h.controller.load_leads().await.expect("load");

    assert_eq!(page.leads.len(), 2);
    let state = h.controller.snapshot().await;
    assert_eq!(ids(&state.leads), vec![1, 2]);
    assert_eq!(state.pagination.total, 2);
    assert_eq!(
        events.recv().await.expect("event"),
        ControllerEvent::LeadsLoaded { count: 2, total: 2 }
    );
}

#[tokio::test]
async fn failed_load_keeps_previous_list_and_notifies_once() {
    let h = harness(vec![lead(1, "A"), lead(2, "B")]);
    h.controller.load_leads().await.expect("load");

    *h.api.fail_list.lock().expect("fail") = Some(LeadsError::Server {
        status: 500,
        message: "boom".into(),
    });
    let err = h.controller.load_leads().await.expect_err("must fail");

    assert!(err.is_server_fault());
    assert_eq!(ids(&h.controller.snapshot().await.leads), vec![1, 2]);
    assert_eq!(h.notifier.count(NoticeLevel::Error), 1);
}

#[tokio::test]
async fn missing_endpoint_is_logged_not_notified() {
    let h = harness(vec![lead(1, "A")]);
    *h.api.fail_list.lock().expect("fail") = Some(LeadsError::NotAvailable {
        endpoint: "leads".into(),
    });

    assert!(h.controller.load_leads().await.is_err());
    assert_eq!(h.notifier.count(NoticeLevel::Error), 0);
}

#[tokio::test]
async fn concurrent_identical_loads_share_one_request() {
    let h = harness(vec![lead(1, "A")]);

    let (first, second) = tokio::join!(h.controller.load_leads(), h.controller.load_leads());

    assert_eq!(first.expect("first"), second.expect("second"));
    assert_eq!(h.api.list_calls(), 1);
}

#[tokio::test]
async fn superseded_load_does_not_overwrite_newer_result() {
    let h = harness(vec![lead(1, "A"), lead(2, "B"), lead(3, "A")]);
    let (release_tx, release_rx) = oneshot::channel();
    *h.api.list_gate.lock().expect("gate") = Some(release_rx);

    let (stale, fresh) = tokio::join!(h.controller.load_leads(), async {
        tokio::task::yield_now().await;
        let fresh = h
            .controller
            .set_filter(Filter::Estado1("A".into()))
            .await;
        let _ = release_tx.send(());
        fresh
    });

    assert_eq!(stale.expect("stale").leads.len(), 3);
    assert_eq!(fresh.expect("fresh").leads.len(), 2);
    assert_eq!(ids(&h.controller.snapshot().await.leads), vec![1, 3]);
}

#[tokio::test]
async fn unknown_filter_key_is_ignored() {
    let h = harness(vec![lead(1, "A")]);

    let result = h.controller.set_filter_raw("favourite_colour", "blue").await;

    assert!(matches!(result, Ok(None)));
    assert_eq!(h.api.list_calls(), 0);
    assert_eq!(h.controller.filters().await, FilterSet::default());
}

#[tokio::test]
async fn filter_change_resets_window_and_reloads() {
    let h = harness((1..=250).map(|id| lead(id, "A")).collect());
    h.controller.go_to_page(3).await.expect("page 3");
    assert_eq!(h.controller.pagination().await.offset, 200);

    h.controller
        .set_filter_raw("estado1", "A")
        .await
        .expect("filter");

    let pagination = h.controller.pagination().await;
    assert_eq!(pagination.offset, 0);
    assert_eq!(pagination.total, 250);
    assert_eq!(h.api.list_calls(), 2);
}

#[tokio::test]
async fn filters_and_page_are_applied_with_one_load() {
    let h = harness((1..=250).map(|id| lead(id, "A")).collect());

    let page = h
        .controller
        .set_filters_at_page([Filter::Estado1("A".into())], 3)
        .await
        .expect("load");

    assert_eq!(h.api.list_calls(), 1);
    assert_eq!(page.pagination.offset, 200);
    assert_eq!(ids(&page.leads), (201..=250).collect::<Vec<_>>());
    assert_eq!(h.controller.pagination().await.offset, 200);
}

#[tokio::test]
async fn estado1_filter_narrows_visible_leads() {
    let h = harness(vec![
        lead(1, "Volver a llamar"),
        lead(2, "No interesado"),
        lead(3, "Volver a llamar"),
    ]);
    h.controller.load_leads().await.expect("load");

    h.controller
        .set_filter(Filter::Estado1("Volver a llamar".into()))
        .await
        .expect("filter");

    let filtered = h.controller.filtered_leads().await;
    assert_eq!(ids(&filtered), vec![1, 3]);
    assert!(filtered
        .iter()
        .all(|lead| lead.status_level_1.as_deref() == Some("Volver a llamar")));

    h.controller.clear_filters().await.expect("clear");
    assert_eq!(h.controller.filtered_leads().await.len(), 3);
}

#[tokio::test]
async fn toggling_twice_sends_both_updates_and_ends_unselected() {
    let h = harness(vec![lead(1, "A")]);
    h.controller.load_leads().await.expect("load");

    h.controller
        .toggle_selection(LeadId(1), true)
        .await
        .expect("known lead")
        .await
        .expect("push");
    h.controller
        .toggle_selection(LeadId(1), false)
        .await
        .expect("known lead")
        .await
        .expect("push");

    assert_eq!(
        h.api.marks(),
        vec![(vec![LeadId(1)], true), (vec![LeadId(1)], false)]
    );
    assert_eq!(h.controller.selected_count().await, 0);
}

#[tokio::test]
async fn failed_toggle_keeps_optimistic_flag() {
    let h = harness(vec![lead(1, "A")]);
    h.controller.load_leads().await.expect("load");
    *h.api.fail_mark_on_call.lock().expect("fail") = Some(1);

    h.controller
        .toggle_selection(LeadId(1), true)
        .await
        .expect("known lead")
        .await
        .expect("push task");

    assert_eq!(h.controller.selected_lead_ids().await, vec![LeadId(1)]);
    assert!(h.controller.toggle_selection(LeadId(99), true).await.is_none());
}

fn batched_settings() -> ControllerSettings {
    ControllerSettings {
        select_batch_size: 2,
        confirm_batch_threshold: 1,
        ..ControllerSettings::default()
    }
}

fn mixed_leads() -> Vec<Lead> {
    vec![
        lead(1, "A"),
        lead(2, "A"),
        lead(3, "A"),
        lead(4, "A"),
        lead(5, "A"),
        lead(6, "B"),
        lead(7, "B"),
    ]
}

#[tokio::test]
async fn select_all_filtered_selects_exactly_the_filtered_leads_in_batches() {
    let h = harness_with(mixed_leads(), true, batched_settings());
    h.controller.load_leads().await.expect("load");
    // Filter locally only so the non-matching leads stay in the list.
    {
        let mut state = h.controller.state.lock().await;
        state.filters.apply(Filter::Estado1("A".into()));
    }

    let selected = h.controller.select_all_filtered(true).await.expect("select");

    assert_eq!(selected, 5);
    assert_eq!(h.confirmer.calls(), 1);
    let sizes: Vec<usize> = h.api.marks().iter().map(|(ids, _)| ids.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    let selected_ids: Vec<i64> = h
        .controller
        .selected_lead_ids()
        .await
        .iter()
        .map(|id| id.0)
        .collect();
    assert_eq!(selected_ids, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn declined_confirmation_changes_nothing() {
    let h = harness_with(mixed_leads(), false, batched_settings());
    h.controller.load_leads().await.expect("load");

    let selected = h.controller.select_all_filtered(true).await.expect("select");

    assert_eq!(selected, 0);
    assert_eq!(h.confirmer.calls(), 1);
    assert!(h.api.marks().is_empty());
    assert_eq!(h.controller.selected_count().await, 0);
}

#[tokio::test]
async fn bulk_deselect_never_asks_for_confirmation() {
    let h = harness_with(mixed_leads(), false, batched_settings());
    h.controller.load_leads().await.expect("load");

    let updated = h
        .controller
        .select_all_filtered(false)
        .await
        .expect("deselect");

    assert_eq!(updated, 7);
    assert_eq!(h.confirmer.calls(), 0);
    assert_eq!(h.api.marks().len(), 4);
}

#[tokio::test]
async fn failed_batch_stops_and_keeps_acknowledged_batches() {
    let h = harness_with(mixed_leads(), true, batched_settings());
    h.controller.load_leads().await.expect("load");
    *h.api.fail_mark_on_call.lock().expect("fail") = Some(2);

    let err = h
        .controller
        .select_all_filtered(true)
        .await
        .expect_err("must fail");

    assert!(err.is_server_fault());
    assert_eq!(h.api.marks().len(), 2);
    assert_eq!(
        h.controller.selected_lead_ids().await,
        vec![LeadId(1), LeadId(2)]
    );
    assert_eq!(h.notifier.count(NoticeLevel::Error), 1);
}

#[tokio::test]
async fn select_all_with_no_matches_is_a_no_op() {
    let h = harness(vec![lead(1, "A")]);
    h.controller.load_leads().await.expect("load");
    {
        let mut state = h.controller.state.lock().await;
        state.filters.apply(Filter::Estado1("Z".into()));
    }

    assert_eq!(h.controller.select_all_filtered(true).await.expect("ok"), 0);
    assert!(h.api.marks().is_empty());
    assert_eq!(h.notifier.count(NoticeLevel::Info), 1);
}

#[tokio::test]
async fn deselect_all_clears_every_local_flag() {
    let mut leads = mixed_leads();
    leads[0].selected_for_calling = true;
    leads[6].selected_for_calling = true;
    let h = harness(leads);
    h.controller.load_leads().await.expect("load");

    let cleared = h.controller.deselect_all().await.expect("deselect");

    assert_eq!(cleared, 2);
    assert_eq!(h.controller.selected_count().await, 0);
    assert_eq!(h.api.deselect_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.confirmer.calls(), 0);
}

#[tokio::test]
async fn select_by_status_validates_and_reloads() {
    let h = harness(mixed_leads());

    let err = h
        .controller
        .select_by_status(StatusField::StatusLevel1, "  ", None, true)
        .await
        .expect_err("empty value");
    assert!(matches!(err, LeadsError::Invalid(_)));

    let count = h
        .controller
        .select_by_status(StatusField::StatusLevel1, "B", Some(" "), true)
        .await
        .expect("select");

    assert_eq!(count, 2);
    let requests = h.api.by_status.lock().expect("requests").clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].archivo_origen, None);
    assert_eq!(h.api.list_calls(), 1);
    assert_eq!(
        h.controller.selected_lead_ids().await,
        vec![LeadId(6), LeadId(7)]
    );
}

#[tokio::test]
async fn reset_requires_confirmation() {
    let declined = harness_with(mixed_leads(), false, ControllerSettings::default());
    assert!(!declined.controller.reset_leads(true, true).await.expect("ok"));
    assert!(declined.api.resets.lock().expect("resets").is_empty());

    let accepted = harness(mixed_leads());
    assert!(accepted.controller.reset_leads(true, false).await.expect("ok"));
    let resets = accepted.api.resets.lock().expect("resets").clone();
    assert_eq!(resets.len(), 1);
    assert!(resets[0].reset_attempts);
    assert!(!resets[0].reset_selection);
    assert!(resets[0].lead_ids.is_none());
}

#[tokio::test(start_paused = true)]
async fn status_is_fetched_at_most_once_per_interval() {
    let h = harness(Vec::new());

    let first = h.controller.get_status().await.expect("status");
    let second = h.controller.get_status().await.expect("status");
    assert_eq!(first, second);
    assert_eq!(h.api.status_calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(3)).await;
    h.controller.get_status().await.expect("status");
    assert_eq!(h.api.status_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.controller.last_known_status().map(|s| s.stats.total),
        Some(2)
    );
}

#[tokio::test(start_paused = true)]
async fn failed_status_is_throttled_like_a_successful_one() {
    let h = harness(Vec::new());
    *h.api.fail_status.lock().expect("fail") = Some(LeadsError::Server {
        status: 502,
        message: "engine down".into(),
    });

    for _ in 0..5 {
        assert!(h.controller.get_status().await.is_err());
    }
    assert_eq!(h.api.status_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.last_known_status(), None);

    tokio::time::advance(Duration::from_secs(3)).await;
    *h.api.fail_status.lock().expect("fail") = None;
    h.controller.get_status().await.expect("recovered");
    assert_eq!(h.api.status_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn status_fetched_across_a_stop_is_not_cached() {
    let h = harness(Vec::new());
    let (release_tx, release_rx) = oneshot::channel();
    *h.api.status_gate.lock().expect("gate") = Some(release_rx);

    let (before_stop, stopped) = tokio::join!(h.controller.get_status(), async {
        tokio::task::yield_now().await;
        let stopped = h.controller.stop_calling().await;
        let _ = release_tx.send(());
        stopped
    });
    stopped.expect("stop");
    assert_eq!(before_stop.expect("status").stats.total, 1);

    let after_stop = h.controller.get_status().await.expect("status");
    assert_eq!(after_stop.stats.total, 2);
    assert_eq!(h.api.status_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_status_calls_share_one_request() {
    let h = harness(Vec::new());

    let (a, b) = tokio::join!(h.controller.get_status(), h.controller.get_status());

    assert_eq!(a.expect("a"), b.expect("b"));
    assert_eq!(h.api.status_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn start_calling_requires_a_selection() {
    let h = harness(vec![lead(1, "A")]);
    h.controller.load_leads().await.expect("load");

    let err = h
        .controller
        .start_calling(StartOptions::default())
        .await
        .expect_err("nothing selected");

    assert!(matches!(err, LeadsError::NothingSelected));
    assert_eq!(h.notifier.count(NoticeLevel::Warning), 1);
    assert!(h.api.starts.lock().expect("starts").is_empty());
}

#[tokio::test]
async fn test_mode_requires_override_phone() {
    let mut selected = lead(1, "A");
    selected.selected_for_calling = true;
    let h = harness(vec![selected]);
    h.controller.load_leads().await.expect("load");

    let err = h
        .controller
        .start_calling(StartOptions {
            test_mode: true,
            override_phone: Some("   ".into()),
            ..StartOptions::default()
        })
        .await
        .expect_err("missing phone");

    assert!(matches!(err, LeadsError::Invalid(_)));
    assert!(h.api.starts.lock().expect("starts").is_empty());
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_send_selection_and_refresh_status() {
    let mut selected = lead(2, "A");
    selected.selected_for_calling = true;
    let h = harness(vec![lead(1, "A"), selected]);
    h.controller.load_leads().await.expect("load");
    h.controller.get_status().await.expect("status");

    h.controller
        .start_calling(StartOptions {
            test_mode: true,
            override_phone: Some(" 600123123 ".into()),
            ..StartOptions::default()
        })
        .await
        .expect("start");

    let starts = h.api.starts.lock().expect("starts").clone();
    assert_eq!(
        starts,
        vec![StartCallsRequest {
            max_concurrent: 3,
            selected_leads: vec![LeadId(2)],
            override_phone: Some("600123123".into()),
        }]
    );

    h.controller.get_status().await.expect("status");
    assert_eq!(h.api.status_calls.load(Ordering::SeqCst), 2);

    h.controller.stop_calling().await.expect("stop");
    assert_eq!(h.api.stops.load(Ordering::SeqCst), 1);
    h.controller.get_status().await.expect("status");
    assert_eq!(h.api.status_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn poller_stops_when_handle_is_dropped() {
    let h = harness(Vec::new());
    let poller = h.controller.spawn_status_poller(Duration::from_secs(5));

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(poller.is_running());
    let polled = h.api.status_calls.load(Ordering::SeqCst);
    assert!(polled >= 2, "polled {polled} times");

    poller.stop();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.api.status_calls.load(Ordering::SeqCst), polled);
}

#[tokio::test(start_paused = true)]
async fn poller_reloads_leads_every_other_tick() {
    let h = harness(vec![lead(1, "A"), lead(2, "B")]);
    let poller = h.controller.spawn_status_poller(Duration::from_secs(5));

    tokio::time::sleep(Duration::from_secs(21)).await;
    assert_eq!(h.api.status_calls.load(Ordering::SeqCst), 5);
    assert_eq!(h.api.list_calls(), 2);
    assert_eq!(ids(&h.controller.snapshot().await.leads), vec![1, 2]);

    drop(poller);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.api.list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn poller_ends_with_its_controller() {
    let h = harness(Vec::new());
    let poller = h.controller.spawn_status_poller(Duration::from_secs(1));
    drop(h.controller);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!poller.is_running());
}

#[tokio::test]
async fn view_reports_page_rows_and_master_checkbox() {
    let settings = ControllerSettings {
        display_page_size: 2,
        ..ControllerSettings::default()
    };
    let h = harness_with(vec![lead(1, "A"), lead(2, "A"), lead(3, "A")], true, settings);
    h.controller.load_leads().await.expect("load");

    let view = h.controller.view().await;
    assert_eq!(ids(&view.rows), vec![1, 2]);
    assert_eq!(view.page_count, 2);
    assert_eq!(view.filtered_total, 3);
    assert_eq!(view.master, MasterCheckbox::Unchecked);

    h.controller.toggle_selection(LeadId(1), true).await;
    assert_eq!(h.controller.view().await.master, MasterCheckbox::Indeterminate);

    h.controller.toggle_selection(LeadId(2), true).await;
    let view = h.controller.view().await;
    assert_eq!(view.master, MasterCheckbox::Checked);
    assert_eq!(view.selected_count, 2);

    assert_eq!(h.controller.set_display_page(99).await, 2);
    let view = h.controller.view().await;
    assert_eq!(ids(&view.rows), vec![3]);
    assert_eq!(view.master, MasterCheckbox::Unchecked);
}

#[tokio::test]
async fn configuration_rejects_zero_concurrency() {
    let h = harness(Vec::new());

    let err = h
        .controller
        .save_configuration(CallingConfiguration {
            max_concurrent_calls: 0,
        })
        .await
        .expect_err("invalid");
    assert!(matches!(err, LeadsError::Invalid(_)));

    h.controller
        .save_configuration(CallingConfiguration {
            max_concurrent_calls: 5,
        })
        .await
        .expect("save");
    assert_eq!(h.notifier.count(NoticeLevel::Success), 1);
}

#[tokio::test]
async fn unavailable_connection_test_is_not_notified() {
    let h = harness(Vec::new());

    assert!(h.controller.test_connection().await.is_err());
    assert!(h.notifier.notices.lock().expect("notices").is_empty());
}
