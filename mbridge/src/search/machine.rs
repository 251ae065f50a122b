//! Throttle state machine
//!
//! `Idle -> Pending -> InFlight -> {Idle, Pending}`
//!
//! Pure and clock-free: every input returns the actions the driver must
//! perform (arm/disarm the debounce timer, issue a lookup, deliver or
//! discard a result). This keeps the transition rules testable without a
//! runtime; [`super::throttle::SearchThrottle`] executes the actions.

use tracing::debug;

/// Throttle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    /// No query scheduled
    Idle,
    /// Debounce timer armed
    Pending,
    /// One lookup issued, awaiting its result
    InFlight,
}

/// Work the driver must perform after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleAction {
    /// Arm the debounce timer (now + debounce interval)
    ArmTimer,
    /// Disarm the debounce timer
    DisarmTimer,
    /// Start exactly one remote lookup
    IssueLookup { request_id: u64, query: String },
    /// Hand the finished lookup's result to the caller
    DeliverResult { request_id: u64, query: String },
    /// Ignore the finished lookup's result
    DiscardResult { request_id: u64, query: String },
    /// Network unreachable: tell the caller instead of looking up
    ReportOffline { query: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlightRequest {
    request_id: u64,
    query: String,
}

/// Debounce/stale-suppression rules for one search field
#[derive(Debug)]
pub struct ThrottleMachine {
    state: ThrottleState,
    /// Latest submitted query; cleared by cancel
    latest: Option<String>,
    /// Last non-empty query, kept across cancel for retry
    last_query: Option<String>,
    in_flight: Option<InFlightRequest>,
    /// A newer query arrived while a lookup was in flight
    requery: bool,
    next_request_id: u64,
    network_active: bool,
}

impl ThrottleMachine {
    pub fn new() -> Self {
        Self {
            state: ThrottleState::Idle,
            latest: None,
            last_query: None,
            in_flight: None,
            requery: false,
            next_request_id: 1,
            network_active: true,
        }
    }

    pub fn state(&self) -> ThrottleState {
        self.state
    }

    pub fn latest_query(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    pub fn is_network_active(&self) -> bool {
        self.network_active
    }

    pub fn set_network_active(&mut self, active: bool) {
        self.network_active = active;
    }

    /// A new query from the user
    ///
    /// An empty (whitespace-only) query clears the search and behaves like
    /// [`ThrottleMachine::cancel`].
    pub fn submit(&mut self, query: &str) -> Vec<ThrottleAction> {
        if query.trim().is_empty() {
            return self.cancel();
        }

        let query = query.to_string();
        self.latest = Some(query.clone());
        self.last_query = Some(query.clone());

        if !self.network_active {
            let mut actions = Vec::new();
            if self.state == ThrottleState::Pending {
                actions.push(ThrottleAction::DisarmTimer);
                self.state = ThrottleState::Idle;
            }
            self.requery = false;
            actions.push(ThrottleAction::ReportOffline { query });
            return actions;
        }

        match self.state {
            ThrottleState::Idle => {
                self.state = ThrottleState::Pending;
                vec![ThrottleAction::ArmTimer]
            }
            // Timer keeps running; the latest query wins when it fires
            ThrottleState::Pending => Vec::new(),
            ThrottleState::InFlight => {
                self.requery = self
                    .in_flight
                    .as_ref()
                    .is_some_and(|request| request.query != query);
                Vec::new()
            }
        }
    }

    /// Drop everything scheduled; results of issued lookups will be ignored
    pub fn cancel(&mut self) -> Vec<ThrottleAction> {
        let mut actions = Vec::new();
        if self.state == ThrottleState::Pending {
            actions.push(ThrottleAction::DisarmTimer);
        }
        if let Some(request) = self.in_flight.take() {
            debug!("Search: abandoning in-flight lookup #{} for {:?}", request.request_id, request.query);
        }
        self.state = ThrottleState::Idle;
        self.latest = None;
        self.requery = false;
        actions
    }

    /// Re-submit the last non-empty query
    pub fn retry(&mut self) -> Vec<ThrottleAction> {
        match self.last_query.clone() {
            Some(query) => self.submit(&query),
            None => Vec::new(),
        }
    }

    /// The debounce timer fired
    pub fn timer_elapsed(&mut self) -> Vec<ThrottleAction> {
        if self.state != ThrottleState::Pending {
            return Vec::new();
        }
        match self.latest.clone() {
            Some(query) => vec![self.issue(query)],
            None => {
                self.state = ThrottleState::Idle;
                Vec::new()
            }
        }
    }

    /// A lookup finished (successfully or not)
    pub fn lookup_finished(&mut self, request_id: u64, query: &str) -> Vec<ThrottleAction> {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|request| request.request_id == request_id);

        if !current {
            // Cancelled or superseded earlier; state is unaffected
            return vec![ThrottleAction::DiscardResult {
                request_id,
                query: query.to_string(),
            }];
        }
        self.in_flight = None;

        if self.latest.as_deref() == Some(query) {
            self.state = ThrottleState::Idle;
            self.requery = false;
            return vec![ThrottleAction::DeliverResult {
                request_id,
                query: query.to_string(),
            }];
        }

        let mut actions = vec![ThrottleAction::DiscardResult {
            request_id,
            query: query.to_string(),
        }];
        match (self.requery, self.latest.clone()) {
            (true, Some(latest)) => {
                // Pending is skipped through immediately: the user already
                // settled while the previous lookup was running
                self.requery = false;
                actions.push(self.issue(latest));
            }
            _ => {
                self.requery = false;
                self.state = ThrottleState::Idle;
            }
        }
        actions
    }

    fn issue(&mut self, query: String) -> ThrottleAction {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.in_flight = Some(InFlightRequest {
            request_id,
            query: query.clone(),
        });
        self.state = ThrottleState::InFlight;
        ThrottleAction::IssueLookup { request_id, query }
    }
}

impl Default for ThrottleMachine {
    fn default() -> Self {
        Self::new()
    }
}
