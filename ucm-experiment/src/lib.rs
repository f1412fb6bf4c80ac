pub mod block;
pub mod clock;
pub mod session;
pub mod validity;

pub use block::{BlockController, BlockPlan};
pub use clock::{ClockOutput, ClockTimer, TrialClock, TrialTiming};
pub use session::{CircleTask, InputEvent, SessionEvent};
pub use validity::{BlockVerdict, TrialCheck, check_block, check_trial};
