mod controller;
mod session;

pub use controller::{CaptureController, ControllerSnapshot, Outcome};
pub use session::{LoginOutcome, SessionGate};
