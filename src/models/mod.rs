pub mod alert;
pub mod event;

pub use alert::{Alert, RunResult, Severity};
pub use event::{Scenario, ScenarioEvent};
