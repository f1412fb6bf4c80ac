//! Block sequencing: practice blocks first, then scored blocks, one of which
//! may run under a constraint.

use rand::Rng;
use tracing::info;
use ucm_core::config::CircleTaskSettings;
use ucm_core::{ConstraintType, Side};

/// Decisions for one block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPlan {
    /// 1-based, practice blocks included.
    pub index: usize,
    pub is_practice: bool,
    pub constraint: ConstraintType,
    /// Which slider carries a single constraint; `true` selects df2.
    pub df2_constrained: bool,
    pub max_trials: usize,
    /// Block number as exported: 0 for practice, counted from 1 afterwards.
    pub export_number: usize,
}

impl BlockPlan {
    pub fn is_constrained(&self) -> bool {
        self.constraint != ConstraintType::None
    }

    /// Sliders shown as constrained on screen.
    pub fn constrained_sides(&self) -> Vec<Side> {
        match self.constraint {
            ConstraintType::None => Vec::new(),
            ConstraintType::Single if self.df2_constrained => vec![Side::Df2],
            ConstraintType::Single => vec![Side::Df1],
            ConstraintType::Double => Side::BOTH.to_vec(),
        }
    }

    /// Treatment column value. `|` instead of `,` keeps the CSV intact.
    pub fn treatment(&self) -> String {
        self.constrained_sides()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("|")
    }
}

pub struct BlockController<R: Rng> {
    settings: CircleTaskSettings,
    rng: R,
    block_index: usize,
    current: Option<BlockPlan>,
}

impl<R: Rng> BlockController<R> {
    pub fn new(settings: CircleTaskSettings, rng: R) -> Self {
        Self {
            settings,
            rng,
            block_index: 0,
            current: None,
        }
    }

    /// Number of leading practice blocks; none without practice trials.
    pub fn practice_offset(&self) -> usize {
        if self.settings.n_practice_trials > 0 {
            self.settings.n_practice_blocks
        } else {
            0
        }
    }

    /// Total number of blocks in a session.
    pub fn total_blocks(&self) -> usize {
        self.settings.n_blocks.saturating_add(self.practice_offset())
    }

    pub fn next_block(&mut self) -> &BlockPlan {
        self.block_index += 1;
        self.plan_current()
    }

    /// Plans the current index again, e.g. after an invalid block.
    pub fn repeat_block(&mut self) -> &BlockPlan {
        if self.block_index == 0 {
            self.block_index = 1;
        }
        self.plan_current()
    }

    fn plan_current(&mut self) -> &BlockPlan {
        let plan = self.plan(self.block_index);
        info!(
            block = plan.index,
            practice = plan.is_practice,
            treatment = %plan.treatment(),
            trials = plan.max_trials,
            "block planned"
        );
        self.current.insert(plan)
    }

    fn plan(&mut self, index: usize) -> BlockPlan {
        let offset = self.practice_offset();
        let is_practice = index <= offset;
        let constraint = if is_practice {
            // Second practice block rehearses the constrained condition.
            if index == 2 {
                self.settings.practice_constraint
            } else {
                ConstraintType::None
            }
        } else if index == self.settings.constrained_block.saturating_add(offset.saturating_mul(2)) {
            self.settings.constraint_type
        } else {
            ConstraintType::None
        };
        BlockPlan {
            index,
            is_practice,
            constraint,
            df2_constrained: self.rng.random_bool(0.5),
            max_trials: if is_practice {
                self.settings.n_practice_trials
            } else {
                self.settings.n_trials
            },
            export_number: if is_practice { 0 } else { index - offset },
        }
    }

    pub fn current(&self) -> Option<&BlockPlan> {
        self.current.as_ref()
    }

    pub fn block_index(&self) -> usize {
        self.block_index
    }

    pub fn is_last_block(&self) -> bool {
        self.block_index == self.total_blocks()
    }

    pub fn settings(&self) -> &CircleTaskSettings {
        &self.settings
    }

    /// Back to before the first block.
    pub fn reset(&mut self) {
        self.block_index = 0;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn controller(settings: CircleTaskSettings) -> BlockController<StdRng> {
        BlockController::new(settings, StdRng::seed_from_u64(7))
    }

    #[test]
    fn practice_blocks_come_first() {
        let mut c = controller(CircleTaskSettings::default());
        assert_eq!(c.total_blocks(), 5);

        let first = c.next_block().clone();
        assert!(first.is_practice);
        assert_eq!(first.max_trials, 5);
        assert_eq!(first.constraint, ConstraintType::None);
        assert_eq!(first.export_number, 0);

        let second = c.next_block().clone();
        assert!(second.is_practice);
        assert_eq!(second.constraint, ConstraintType::Double);
        assert_eq!(second.treatment(), "df1|df2");

        let third = c.next_block().clone();
        assert!(!third.is_practice);
        assert_eq!(third.max_trials, 20);
        assert_eq!(third.export_number, 1);
        assert!(!c.is_last_block());

        c.next_block();
        c.next_block();
        assert!(c.is_last_block());
    }

    #[test]
    fn constrained_block_is_shifted_by_twice_the_practice_blocks() {
        let settings = CircleTaskSettings {
            constrained_block: 2,
            n_practice_trials: 5,
            n_blocks: 5,
            ..CircleTaskSettings::default()
        };
        let mut c = controller(settings);
        let plans: Vec<BlockPlan> = (0..7).map(|_| c.next_block().clone()).collect();
        assert!(plans[1].is_practice);
        let constrained: Vec<usize> = plans
            .iter()
            .filter(|p| !p.is_practice && p.is_constrained())
            .map(|p| p.index)
            .collect();
        assert_eq!(constrained, [6]);
        assert_eq!(plans[5].constraint, ConstraintType::Single);
        assert_eq!(plans[5].export_number, 4);
        let t = plans[5].treatment();
        assert!(t == "df1" || t == "df2");
    }

    #[test]
    fn no_practice_without_practice_trials() {
        let settings = CircleTaskSettings {
            n_practice_trials: 0,
            constrained_block: 1,
            ..CircleTaskSettings::default()
        };
        let mut c = controller(settings);
        assert_eq!(c.practice_offset(), 0);
        let plan = c.next_block().clone();
        assert!(!plan.is_practice);
        assert_eq!(plan.export_number, 1);
        assert!(plan.is_constrained());
    }

    #[test]
    fn extreme_block_settings_do_not_overflow() {
        let settings = CircleTaskSettings {
            n_blocks: usize::MAX,
            n_practice_blocks: usize::MAX / 2 + 1,
            constrained_block: usize::MAX,
            ..CircleTaskSettings::default()
        };
        let mut c = controller(settings);
        assert_eq!(c.total_blocks(), usize::MAX);
        let plan = c.next_block().clone();
        assert!(plan.is_practice);
        assert!(!c.is_last_block());
    }

    #[test]
    fn repeat_keeps_index() {
        let mut c = controller(CircleTaskSettings::default());
        c.next_block();
        c.next_block();
        assert_eq!(c.repeat_block().index, 2);
        assert_eq!(c.block_index(), 2);
    }
}
