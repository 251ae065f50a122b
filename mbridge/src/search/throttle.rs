//! Incremental search throttle
//!
//! Async driver for [`ThrottleMachine`]. One actor task owns the machine and
//! the debounce deadline; callers only send commands, so no call blocks and
//! no state is shared. Lookups run on their own tasks and report back to the
//! actor, which decides whether a result is still wanted.
//!
//! Cancellation is cooperative: issued lookups are never aborted, their
//! results are discarded when stale. A lookup that panics completes as an
//! `Error::Lookup` failure.

use super::lookup::AddressLookup;
use super::machine::{ThrottleAction, ThrottleMachine};
use mbridge_common::config::SearchConfig;
use mbridge_common::events::{EventBus, RelayEvent};
use mbridge_common::{Error, Result, Suggestion, SuggestionKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Throttle settings
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Delay between arming the timer and issuing the lookup
    pub debounce: Duration,
    /// Family of addresses requested from the lookup service
    pub kind: SuggestionKind,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(mbridge_common::config::DEFAULT_DEBOUNCE_MS),
            kind: SuggestionKind::default(),
        }
    }
}

impl From<&SearchConfig> for ThrottleConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            debounce: config.debounce(),
            kind: config.suggestion_kind,
        }
    }
}

/// What the caller hears back for a settled query
#[derive(Debug)]
pub enum SearchOutcome {
    /// Lookup succeeded (possibly with no suggestions)
    Suggestions {
        query: String,
        suggestions: Vec<Suggestion>,
    },
    /// Lookup failed; retrying is up to the caller
    Failed { query: String, error: Error },
    /// Network unreachable; no lookup was issued
    Offline { query: String },
}

impl SearchOutcome {
    pub fn query(&self) -> &str {
        match self {
            SearchOutcome::Suggestions { query, .. }
            | SearchOutcome::Failed { query, .. }
            | SearchOutcome::Offline { query } => query,
        }
    }
}

#[derive(Debug)]
enum Command {
    Submit(String),
    Cancel,
    Retry,
    SetNetworkActive(bool),
}

struct Completion {
    request_id: u64,
    query: String,
    result: Result<Vec<Suggestion>>,
}

/// Handle to a running search throttle
pub struct SearchThrottle {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SearchThrottle {
    /// Spawn the throttle actor
    ///
    /// Returns the handle and the receiver on which outcomes are delivered.
    pub fn spawn(
        lookup: Arc<dyn AddressLookup>,
        config: ThrottleConfig,
        event_bus: EventBus,
    ) -> (Self, mpsc::UnboundedReceiver<SearchOutcome>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let actor = ThrottleActor {
            machine: ThrottleMachine::new(),
            deadline: None,
            lookup,
            config,
            event_bus,
            outcomes: outcomes_tx,
        };
        let task = tokio::spawn(actor.run(commands_rx, shutdown.clone()));

        (
            Self {
                commands: commands_tx,
                shutdown,
                task,
            },
            outcomes_rx,
        )
    }

    /// Submit the current contents of the search field
    pub fn submit(&self, query: impl Into<String>) -> Result<()> {
        self.send(Command::Submit(query.into()))
    }

    /// Drop any scheduled lookup and ignore in-flight results
    pub fn cancel(&self) -> Result<()> {
        self.send(Command::Cancel)
    }

    /// Re-submit the last non-empty query
    pub fn retry(&self) -> Result<()> {
        self.send(Command::Retry)
    }

    /// Report network reachability changes
    pub fn set_network_active(&self, active: bool) -> Result<()> {
        self.send(Command::SetNetworkActive(active))
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::Internal("Search throttle stopped".to_string()))
    }

    /// Stop the actor and wait for it to exit
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!("Search throttle task ended abnormally: {}", e);
        }
    }
}

struct ThrottleActor {
    machine: ThrottleMachine,
    deadline: Option<Instant>,
    lookup: Arc<dyn AddressLookup>,
    config: ThrottleConfig,
    event_bus: EventBus,
    outcomes: mpsc::UnboundedSender<SearchOutcome>,
}

impl ThrottleActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        let (completions_tx, mut completions_rx) = mpsc::unbounded_channel::<Completion>();
        debug!("Search throttle started (debounce {:?})", self.config.debounce);

        loop {
            let deadline = self.deadline;
            let timer = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,

                command = commands.recv() => {
                    let Some(command) = command else { break };
                    let actions = match command {
                        Command::Submit(query) => self.machine.submit(&query),
                        Command::Cancel => self.machine.cancel(),
                        Command::Retry => self.machine.retry(),
                        Command::SetNetworkActive(active) => {
                            info!("Search: network {}", if active { "reachable" } else { "unreachable" });
                            self.machine.set_network_active(active);
                            Vec::new()
                        }
                    };
                    self.execute(actions, None, &completions_tx);
                }

                _ = timer => {
                    self.deadline = None;
                    let actions = self.machine.timer_elapsed();
                    self.execute(actions, None, &completions_tx);
                }

                Some(completion) = completions_rx.recv() => {
                    let actions = self
                        .machine
                        .lookup_finished(completion.request_id, &completion.query);
                    self.execute(actions, Some(completion.result), &completions_tx);
                }
            }
        }

        debug!("Search throttle stopped");
    }

    fn execute(
        &mut self,
        actions: Vec<ThrottleAction>,
        mut result: Option<Result<Vec<Suggestion>>>,
        completions: &mpsc::UnboundedSender<Completion>,
    ) {
        for action in actions {
            match action {
                ThrottleAction::ArmTimer => {
                    self.deadline = Some(Instant::now() + self.config.debounce);
                }
                ThrottleAction::DisarmTimer => {
                    self.deadline = None;
                }
                ThrottleAction::IssueLookup { request_id, query } => {
                    self.issue_lookup(request_id, query, completions);
                }
                ThrottleAction::DeliverResult { request_id, query } => {
                    let Some(result) = result.take() else {
                        warn!("Search: no result to deliver for lookup #{}", request_id);
                        continue;
                    };
                    self.deliver(request_id, query, result);
                }
                ThrottleAction::DiscardResult { request_id, query } => {
                    debug!("Search: discarding stale result #{} for {:?}", request_id, query);
                    self.event_bus.emit_lossy(RelayEvent::StaleResultDiscarded {
                        request_id,
                        query,
                        timestamp: chrono::Utc::now(),
                    });
                }
                ThrottleAction::ReportOffline { query } => {
                    info!("Search: offline, not looking up {:?}", query);
                    self.send_outcome(SearchOutcome::Offline { query });
                }
            }
        }
    }

    fn issue_lookup(
        &self,
        request_id: u64,
        query: String,
        completions: &mpsc::UnboundedSender<Completion>,
    ) {
        info!("Search: lookup #{} for {:?}", request_id, query);
        self.event_bus.emit_lossy(RelayEvent::LookupIssued {
            request_id,
            query: query.clone(),
            timestamp: chrono::Utc::now(),
        });

        let lookup = Arc::clone(&self.lookup);
        let kind = self.config.kind;
        let completions = completions.clone();
        tokio::spawn(async move {
            // The lookup runs on its own task so a panic still completes the request
            let task_query = query.clone();
            let task = tokio::spawn(async move { lookup.lookup(&task_query, kind).await });
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Search: lookup #{} for {:?} aborted: {}", request_id, query, e);
                    Err(Error::Lookup(format!("Lookup task failed: {}", e)))
                }
            };
            // Actor gone means nobody wants the result
            let _ = completions.send(Completion {
                request_id,
                query,
                result,
            });
        });
    }

    fn deliver(&self, request_id: u64, query: String, result: Result<Vec<Suggestion>>) {
        let timestamp = chrono::Utc::now();
        let outcome = match result {
            Ok(suggestions) => {
                debug!("Search: {} suggestions for {:?}", suggestions.len(), query);
                self.event_bus.emit_lossy(RelayEvent::LookupCompleted {
                    request_id,
                    query: query.clone(),
                    result_count: suggestions.len(),
                    timestamp,
                });
                SearchOutcome::Suggestions { query, suggestions }
            }
            Err(error) => {
                warn!("Search: lookup #{} for {:?} failed: {}", request_id, query, error);
                self.event_bus.emit_lossy(RelayEvent::LookupFailed {
                    request_id,
                    query: query.clone(),
                    error: error.to_string(),
                    timestamp,
                });
                SearchOutcome::Failed { query, error }
            }
        };
        self.send_outcome(outcome);
    }

    fn send_outcome(&self, outcome: SearchOutcome) {
        if self.outcomes.send(outcome).is_err() {
            debug!("Search: outcome receiver dropped");
        }
    }
}
