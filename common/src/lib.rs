pub mod aggregate;
pub mod config;
pub mod device_set;
pub mod error;
pub mod events;
pub mod group;
pub mod mode;
pub mod setpoint;
pub mod topics;
pub mod types;

pub use config::{BrokerConfig, ControllerConfig, GroupConfig, SensorRule};
pub use device_set::DeviceSet;
pub use error::PayloadError;
pub use events::{GroupCommand, SwitchSetup, Telemetry};
pub use group::{GroupAction, GroupEngine, GroupEvent};
pub use mode::ModeController;
pub use setpoint::{HvacSetpoints, Lighting, Slopes, SpaceValues};
pub use topics::*;
pub use types::{AutoMode, GroupStatus};
