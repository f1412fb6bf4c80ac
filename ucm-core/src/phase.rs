/// Phases of one trial cycle as driven by the trial clock.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum TrialPhase {
    /// Block started, waiting for the first tick.
    #[default]
    Idle,
    /// Sliders disabled, "get ready" shown for the warm-up time.
    Prepare,
    /// Sliders enabled, countdown running.
    Active,
    /// Trial captured, waiting for the next tick.
    Cooldown,
    /// All trials done, no further ticks.
    Completed,
    /// Cancelled by the participant, data discarded.
    Interrupted,
}

impl TrialPhase {
    pub fn allows_input(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Idle | Self::Prepare | Self::Active | Self::Cooldown)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Interrupted)
    }
}
