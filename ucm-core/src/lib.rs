pub mod channel;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod events;
pub mod phase;
pub mod trial;

pub use channel::{ChannelPair, ControlChannel, Side, TouchId};
pub use config::{ConstraintType, InvalidBlockPolicy, Settings};
pub use context::{AppContext, Capabilities};
pub use device::DeviceInfo;
pub use error::{Error, Result};
pub use events::{CountdownLabel, DisplayCommand, EventBus, Notification, Presenter, Warning};
pub use phase::TrialPhase;
pub use trial::{Trial, TrialLayout};
