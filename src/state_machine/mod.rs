mod budget;
mod state;

pub use budget::{CallOutcome, RetryPolicy};
pub use state::{CallMachine, CallState, Event, Resolution};
