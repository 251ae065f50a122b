//! Throttled incremental address search
//!
//! - [`machine`]: pure debounce / stale-suppression state machine
//! - [`throttle`]: async actor driving the machine against a lookup service
//! - [`lookup`]: the lookup service interface and implementations

pub mod lookup;
pub mod machine;
pub mod throttle;

pub use lookup::{AddressLookup, CannedAddressLookup, HttpAddressLookup};
pub use machine::{ThrottleAction, ThrottleMachine, ThrottleState};
pub use throttle::{SearchOutcome, SearchThrottle, ThrottleConfig};
