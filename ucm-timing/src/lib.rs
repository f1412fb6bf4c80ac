pub mod scheduler;
pub mod timer;

pub use scheduler::{LATE_WARNING, ManualScheduler, RealtimeScheduler, Scheduler, TimerHandle};
pub use timer::{HighPrecisionTimer, Timer, TimingStats};
