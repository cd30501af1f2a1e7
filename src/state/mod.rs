// Hub state and fanout

mod engine;
mod snapshot;

pub use engine::{HubState, DEFAULT_PULSE_WIDTH};
pub use snapshot::{Environment, Radar, SensorSnapshot};
