//! Scripted stand-in for a person operating the two sliders.

use crate::app::AppEvent;
use rand::Rng;
use tracing::debug;
use ucm_core::{DisplayCommand, Side, TouchId};
use ucm_experiment::{InputEvent, SessionEvent};
use ucm_timing::Scheduler;

pub struct SimulatedParticipant<R: Rng> {
    rng: R,
    trial_duration: f64,
    /// Chance per block of leaving one slider alone for the whole block.
    neglect: f64,
    neglected: Option<Side>,
    next_touch: u64,
}

impl<R: Rng> SimulatedParticipant<R> {
    pub fn new(rng: R, trial_duration: f64, neglect: f64) -> Self {
        Self {
            rng,
            trial_duration,
            neglect: neglect.clamp(0.0, 1.0),
            neglected: None,
            next_touch: 1,
        }
    }

    /// Schedules the inputs a person would produce in response to `event`.
    pub fn react<S>(&mut self, event: &SessionEvent, sched: &mut S)
    where
        S: Scheduler<AppEvent> + ?Sized,
    {
        match event {
            SessionEvent::Display(DisplayCommand::StartCountdown { seconds }) => {
                sched.schedule_once(*seconds, InputEvent::CountdownFinished.into());
            }
            SessionEvent::BlockStarted { plan } => {
                self.neglected = if self.rng.random_bool(self.neglect) {
                    Some(if self.rng.random_bool(0.5) { Side::Df1 } else { Side::Df2 })
                } else {
                    None
                };
                if let Some(side) = self.neglected {
                    debug!(block = plan.index, side = side.as_str(), "participant ignores slider");
                }
            }
            SessionEvent::TrialStarted { .. } => {
                for side in Side::BOTH {
                    if self.neglected != Some(side) {
                        self.operate(side, sched);
                    }
                }
            }
            _ => {}
        }
    }

    fn operate<S>(&mut self, side: Side, sched: &mut S)
    where
        S: Scheduler<AppEvent> + ?Sized,
    {
        let touch = TouchId(self.next_touch);
        self.next_touch += 1;
        let d = self.trial_duration;
        let grab = self.rng.random_range(0.05..0.3) * d;
        let moved = self.rng.random_range(0.3..0.6) * d;
        let release = self.rng.random_range(0.65..0.95) * d;
        let value = self.rng.random_range(0.0..=1.0);

        sched.schedule_once(grab, InputEvent::Grab { side, touch }.into());
        sched.schedule_once(moved, InputEvent::Move { side, touch, value }.into());
        sched.schedule_once(release, InputEvent::Release { side, touch }.into());
    }

    /// Difficulty rating for the finished block, sometimes dismissed.
    pub fn rate(&mut self) -> Option<u8> {
        if self.rng.random_bool(0.1) {
            None
        } else {
            Some(self.rng.random_range(1..=5))
        }
    }
}
