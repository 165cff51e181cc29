//! Client side of the check-then-poll protocol: start a resource, then poll its
//! status on a fixed interval until it completes, fails, or runs out of attempts.

mod error;
mod poller;
mod source;

pub use error::PollError;
pub use poller::{PollOutcome, PollSession, PollState, Poller, PollerConfig};
pub use source::{HttpStatusSource, StatusSource};
