//! Incremental search controller.
//!
//! Turns keystrokes into at most one remote lookup per pause in typing and
//! exposes the evolving candidate list and loading flag.
//!
//! Every lookup runs as a *session* tagged with a generation number. Any
//! trigger (new text, closing the list, dropping the controller) bumps the
//! controller's generation; a session whose tag no longer matches may not
//! write anything. The network call itself is never aborted, only its effect.
//! A pending debounce timer, on the other hand, is aborted outright.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{CadastroError, LookupError, Result};
use crate::form::FormStore;
use crate::lookup::{DiagnosticSink, PersonLookup, TracingDiagnostics};
use crate::models::Candidate;

/// When lookups are issued and with what query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPolicy {
    /// Fetch the whole list once at construction; typing only filters locally
    /// in the rendering layer, if at all.
    EagerFetchOnce,
    /// Debounce on text, but only while the list is open.
    OpenTriggered { debounce: Duration },
    /// Debounce directly on text; the service filters server-side.
    TextTriggered { debounce: Duration },
}

impl SearchPolicy {
    pub const OPEN_DEBOUNCE: Duration = Duration::from_millis(500);
    pub const TEXT_DEBOUNCE: Duration = Duration::from_millis(700);

    pub fn open_triggered() -> Self {
        Self::OpenTriggered {
            debounce: Self::OPEN_DEBOUNCE,
        }
    }

    pub fn text_triggered() -> Self {
        Self::TextTriggered {
            debounce: Self::TEXT_DEBOUNCE,
        }
    }

    fn debounce(&self) -> Option<Duration> {
        match self {
            Self::EagerFetchOnce => None,
            Self::OpenTriggered { debounce } | Self::TextTriggered { debounce } => Some(*debounce),
        }
    }

    /// Only the open-triggered policy models an explicit open state.
    fn gates_on_open(&self) -> bool {
        matches!(self, Self::OpenTriggered { .. })
    }
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self::text_triggered()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPhase {
    /// No timer pending, nothing in flight.
    #[default]
    Idle,
    /// Timer armed, lookup not yet issued.
    Debouncing,
    /// Lookup in flight for the active session.
    Loading,
}

/// What the rendering layer reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchSnapshot {
    pub query: String,
    pub open: bool,
    pub candidates: Vec<Candidate>,
    pub loading: bool,
    pub phase: SearchPhase,
}

struct SearchState {
    view: SearchSnapshot,
    generation: u64,
    /// Set only while the active session is still sleeping.
    timer: Option<JoinHandle<()>>,
}

impl SearchState {
    /// Start a new generation, cancelling a pending timer.
    fn supersede(&mut self) -> u64 {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation += 1;
        self.generation
    }

    fn reset(&mut self) {
        self.supersede();
        self.view.candidates.clear();
        self.view.loading = false;
        self.view.phase = SearchPhase::Idle;
    }
}

struct Shared {
    state: Mutex<SearchState>,
    updates: watch::Sender<SearchSnapshot>,
    lookup: Arc<dyn PersonLookup>,
    diagnostics: Arc<dyn DiagnosticSink>,
    policy: SearchPolicy,
    lookup_timeout: Option<Duration>,
}

impl Shared {
    fn publish(&self, state: &SearchState) {
        self.updates.send_replace(state.view.clone());
    }

    /// Query to send once the timer fires, or `None` for the short-circuit.
    fn session_query(&self, view: &SearchSnapshot) -> Option<String> {
        if self.policy == SearchPolicy::EagerFetchOnce {
            return Some(String::new());
        }
        if view.query.is_empty() || (self.policy.gates_on_open() && !view.open) {
            return None;
        }
        Some(view.query.clone())
    }

    async fn fetch(&self, query: &str) -> std::result::Result<Vec<Candidate>, LookupError> {
        match self.lookup_timeout {
            Some(limit) => tokio::time::timeout(limit, self.lookup.search(query))
                .await
                .unwrap_or(Err(LookupError::Timeout(limit))),
            None => self.lookup.search(query).await,
        }
    }
}

async fn run_session(shared: Arc<Shared>, generation: u64, delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let query = {
        let mut state = shared.state.lock();
        if state.generation != generation {
            return;
        }
        state.timer = None;
        match shared.session_query(&state.view) {
            Some(query) => {
                state.view.loading = true;
                state.view.phase = SearchPhase::Loading;
                shared.publish(&state);
                query
            }
            None => {
                state.view.candidates.clear();
                state.view.loading = false;
                state.view.phase = SearchPhase::Idle;
                shared.publish(&state);
                return;
            }
        }
    };

    tracing::debug!(generation, query = %query, "issuing person lookup");
    let outcome = shared.fetch(&query).await;
    if let Err(e) = &outcome {
        shared.diagnostics.lookup_failed(&query, e);
    }

    let mut state = shared.state.lock();
    if state.generation != generation {
        tracing::debug!(
            generation,
            current = state.generation,
            query = %query,
            "discarding superseded lookup result"
        );
        return;
    }
    state.view.candidates = outcome.unwrap_or_default();
    state.view.loading = false;
    state.view.phase = SearchPhase::Idle;
    shared.publish(&state);
}

pub struct SearchControllerBuilder {
    lookup: Arc<dyn PersonLookup>,
    store: FormStore,
    policy: SearchPolicy,
    diagnostics: Arc<dyn DiagnosticSink>,
    lookup_timeout: Option<Duration>,
}

impl SearchControllerBuilder {
    pub fn policy(mut self, policy: SearchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn lookup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Must be called from within a tokio runtime; sessions are spawned on it.
    pub fn build(self) -> Result<SearchController> {
        let runtime =
            Handle::try_current().map_err(|e| CadastroError::NoRuntime(e.to_string()))?;
        let (updates, _) = watch::channel(SearchSnapshot::default());
        let controller = SearchController {
            shared: Arc::new(Shared {
                state: Mutex::new(SearchState {
                    view: SearchSnapshot::default(),
                    generation: 0,
                    timer: None,
                }),
                updates,
                lookup: self.lookup,
                diagnostics: self.diagnostics,
                policy: self.policy,
                lookup_timeout: self.lookup_timeout,
            }),
            store: self.store,
            runtime,
        };

        if controller.shared.policy == SearchPolicy::EagerFetchOnce {
            let mut state = controller.shared.state.lock();
            controller.arm(&mut state, Duration::ZERO);
            controller.shared.publish(&state);
        }
        Ok(controller)
    }
}

/// Debounced, cancellable person search bound to one form.
pub struct SearchController {
    shared: Arc<Shared>,
    store: FormStore,
    runtime: Handle,
}

impl SearchController {
    pub fn builder(lookup: Arc<dyn PersonLookup>, store: FormStore) -> SearchControllerBuilder {
        SearchControllerBuilder {
            lookup,
            store,
            policy: SearchPolicy::default(),
            diagnostics: Arc::new(TracingDiagnostics),
            lookup_timeout: None,
        }
    }

    pub fn policy(&self) -> SearchPolicy {
        self.shared.policy
    }

    /// The form this controller commits selections into.
    pub fn store(&self) -> &FormStore {
        &self.store
    }

    /// Record new query text. Never blocks.
    pub fn on_text_change(&self, text: impl Into<String>) {
        let mut state = self.shared.state.lock();
        state.view.query = text.into();
        if let Some(delay) = self.shared.policy.debounce() {
            if self.shared.session_query(&state.view).is_some() {
                self.arm(&mut state, delay);
            } else {
                state.reset();
            }
        }
        self.shared.publish(&state);
    }

    pub fn on_open(&self) {
        let mut state = self.shared.state.lock();
        state.view.open = true;
        if self.shared.policy.gates_on_open() {
            if let Some(delay) = self.shared.policy.debounce() {
                if self.shared.session_query(&state.view).is_some() {
                    self.arm(&mut state, delay);
                }
            }
        }
        self.shared.publish(&state);
    }

    pub fn on_close(&self) {
        let mut state = self.shared.state.lock();
        state.view.open = false;
        if self.shared.policy.gates_on_open() {
            state.reset();
        }
        self.shared.publish(&state);
    }

    /// Commit the chosen candidate's id to the form, or clear it.
    pub fn on_select(&self, candidate: Option<&Candidate>) {
        let id = candidate.map(|c| c.id);
        tracing::debug!(?id, "pessoa selected");
        self.store.set_selection(id);
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        self.shared.state.lock().view.clone()
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        self.shared.state.lock().view.candidates.clone()
    }

    pub fn loading(&self) -> bool {
        self.shared.state.lock().view.loading
    }

    pub fn phase(&self) -> SearchPhase {
        self.shared.state.lock().view.phase
    }

    /// Receiver updated on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Wait until no timer is pending and nothing is in flight.
    pub async fn settled(&self) -> SearchSnapshot {
        let mut rx = self.subscribe();
        match rx.wait_for(|s| s.phase == SearchPhase::Idle).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    fn arm(&self, state: &mut SearchState, delay: Duration) {
        let generation = state.supersede();
        state.view.loading = false;
        state.view.phase = SearchPhase::Debouncing;
        let handle = self
            .runtime
            .spawn(run_session(Arc::clone(&self.shared), generation, delay));
        state.timer = Some(handle);
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        self.shared.state.lock().supersede();
    }
}
