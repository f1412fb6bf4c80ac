//! Checks whether the participant operated the sliders as instructed.

use ucm_core::{DisplayCommand, Side, Trial, TrialLayout, Warning};

/// Outcome of the check after a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrialCheck {
    pub df1_unused: bool,
    pub df2_unused: bool,
    /// Sliders were not held at the same time.
    pub overlap_violation: bool,
}

impl TrialCheck {
    pub fn unused(&self, side: Side) -> bool {
        match side {
            Side::Df1 => self.df1_unused,
            Side::Df2 => self.df2_unused,
        }
    }

    /// Warning indicator states for the task screen.
    pub fn warnings(&self) -> Vec<DisplayCommand> {
        let mut out: Vec<DisplayCommand> = Side::BOTH
            .iter()
            .map(|&side| DisplayCommand::SetWarningVisible {
                warning: Warning::Unused(side),
                visible: self.unused(side),
            })
            .collect();
        out.push(DisplayCommand::SetWarningVisible {
            warning: Warning::Concurrency,
            visible: self.overlap_violation,
        });
        out
    }
}

pub fn check_trial(trial: &Trial) -> TrialCheck {
    let unused = |side| {
        let (grab, release) = trial.timing(side);
        grab.is_nan() && release.is_nan()
    };
    let (g1, r1) = trial.timing(Side::Df1);
    let (g2, r2) = trial.timing(Side::Df2);
    let any_missing = [g1, r1, g2, r2].iter().any(|t| t.is_nan());
    TrialCheck {
        df1_unused: unused(Side::Df1),
        df2_unused: unused(Side::Df2),
        overlap_violation: any_missing || g1 >= r2 || g2 >= r1,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockVerdict {
    Valid,
    /// At least one slider was never grabbed in any trial.
    Invalid { never_used: Vec<Side> },
}

impl BlockVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, BlockVerdict::Valid)
    }
}

/// A block is invalid when the grab time of either slider is missing in
/// every trial. Without timings there is nothing to judge.
pub fn check_block(trials: &[Trial], layout: TrialLayout) -> BlockVerdict {
    if layout == TrialLayout::ValuesOnly {
        return BlockVerdict::Valid;
    }
    let never_used: Vec<Side> = Side::BOTH
        .into_iter()
        .filter(|&side| trials.iter().all(|t| t.timing(side).0.is_nan()))
        .collect();
    if never_used.is_empty() {
        BlockVerdict::Valid
    } else {
        BlockVerdict::Invalid { never_used }
    }
}
