//! The trial clock: one repeating tick per trial cycle, a one-shot timer
//! opening each trial after the warm-up, and the countdown signal closing it.

use crate::validity::{TrialCheck, check_trial};
use tracing::{debug, info, warn};
use ucm_core::config::CircleTaskSettings;
use ucm_core::{
    ChannelPair, CountdownLabel, DisplayCommand, Side, TouchId, Trial, TrialPhase, Warning,
};
use ucm_timing::{Scheduler, TimerHandle};

/// Timer events owned by the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTimer {
    Tick,
    BeginTrial,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialTiming {
    pub warm_up: f64,
    pub trial_duration: f64,
    pub cool_down: f64,
}

impl TrialTiming {
    pub fn from_settings(s: &CircleTaskSettings) -> Self {
        Self {
            warm_up: s.warm_up,
            trial_duration: s.trial_duration,
            cool_down: s.cool_down,
        }
    }

    /// Time between two ticks.
    pub fn period(&self) -> f64 {
        self.warm_up + self.trial_duration + self.cool_down
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClockOutput {
    Display(DisplayCommand),
    TrialStarted { index: usize },
    TrialFinished { index: usize, check: TrialCheck },
    BlockFinished,
    Interrupted { discarded: usize },
}

pub struct TrialClock {
    phase: TrialPhase,
    timing: TrialTiming,
    max_trials: usize,
    /// 1-based number of the trial in progress, 0 before the first tick.
    current_trial: usize,
    onset: Option<f64>,
    channels: ChannelPair,
    trials: Vec<Trial>,
    tick: Option<TimerHandle>,
    begin: Option<TimerHandle>,
}

impl TrialClock {
    pub fn new(timing: TrialTiming, max_trials: usize) -> Self {
        Self {
            phase: TrialPhase::Idle,
            timing,
            max_trials,
            current_trial: 0,
            onset: None,
            channels: ChannelPair::default(),
            trials: Vec::new(),
            tick: None,
            begin: None,
        }
    }

    /// Disables the sliders and starts the repeating tick. The first trial
    /// is prepared one full period later.
    pub fn start<E, S>(&mut self, sched: &mut S) -> Vec<ClockOutput>
    where
        E: From<ClockTimer>,
        S: Scheduler<E> + ?Sized,
    {
        if self.tick.is_some() {
            warn!("trial clock already started");
            return Vec::new();
        }
        self.phase = TrialPhase::Idle;
        self.current_trial = 0;
        self.trials.clear();
        self.channels.disable_all(f64::NAN);

        let period = self.timing.period();
        self.tick = Some(sched.schedule_repeating(period, ClockTimer::Tick.into()));
        debug!(period, max_trials = self.max_trials, "trial clock started");

        let mut out = self.channel_states(false);
        out.push(ClockOutput::Display(DisplayCommand::SetCountdownLabel(
            CountdownLabel::Prepare,
        )));
        out.push(self.progress());
        out
    }

    pub fn on_timer<E, S>(&mut self, timer: ClockTimer, sched: &mut S) -> Vec<ClockOutput>
    where
        E: From<ClockTimer>,
        S: Scheduler<E> + ?Sized,
    {
        match timer {
            ClockTimer::Tick => self.on_tick(sched),
            ClockTimer::BeginTrial => self.begin_trial(sched),
        }
    }

    fn on_tick<E, S>(&mut self, sched: &mut S) -> Vec<ClockOutput>
    where
        E: From<ClockTimer>,
        S: Scheduler<E> + ?Sized,
    {
        if self.phase.is_terminal() {
            debug!(phase = ?self.phase, "stale tick ignored");
            return Vec::new();
        }
        let mut out = Vec::new();
        if self.phase == TrialPhase::Active {
            warn!(
                trial = self.current_trial,
                "tick arrived before the countdown finished, closing trial"
            );
            out.extend(self.finish_trial(sched.now()));
        }

        if self.current_trial == self.max_trials {
            out.extend(self.complete(sched));
            return out;
        }

        self.current_trial += 1;
        self.channels.reset_all();
        self.phase = TrialPhase::Prepare;
        self.begin = Some(sched.schedule_once(self.timing.warm_up, ClockTimer::BeginTrial.into()));

        out.push(ClockOutput::Display(DisplayCommand::SetCountdownLabel(
            CountdownLabel::GetReady,
        )));
        out.push(self.progress());
        out
    }

    fn begin_trial<E, S>(&mut self, sched: &mut S) -> Vec<ClockOutput>
    where
        S: Scheduler<E> + ?Sized,
    {
        self.begin = None;
        if self.phase != TrialPhase::Prepare {
            debug!(phase = ?self.phase, "stale trial start ignored");
            return Vec::new();
        }
        self.channels.enable_all();
        self.onset = Some(sched.now());
        self.phase = TrialPhase::Active;
        let index = self.current_trial - 1;
        debug!(trial = index, onset = sched.now(), "trial started");

        let mut out = self.channel_states(true);
        out.push(ClockOutput::Display(DisplayCommand::StartCountdown {
            seconds: self.timing.trial_duration,
        }));
        out.push(ClockOutput::TrialStarted { index });
        out
    }

    /// The countdown of the running trial has elapsed.
    pub fn countdown_finished(&mut self, now: f64) -> Vec<ClockOutput> {
        if self.phase != TrialPhase::Active {
            debug!(phase = ?self.phase, "countdown signal outside a trial ignored");
            return Vec::new();
        }
        self.finish_trial(now)
    }

    fn finish_trial(&mut self, now: f64) -> Vec<ClockOutput> {
        let since = self.since_onset(now);
        self.channels.disable_all(since);
        let index = self.current_trial - 1;
        let trial = Trial::capture(index, &self.channels);
        let check = check_trial(&trial);
        self.trials.push(trial);
        self.onset = None;
        self.phase = TrialPhase::Cooldown;
        debug!(trial = index, ?check, "trial finished");

        let mut out = self.channel_states(false);
        out.push(ClockOutput::Display(DisplayCommand::SetCountdownLabel(
            CountdownLabel::Finished,
        )));
        out.extend(check.warnings().into_iter().map(ClockOutput::Display));
        out.push(ClockOutput::TrialFinished { index, check });
        out
    }

    fn complete<E, S>(&mut self, sched: &mut S) -> Vec<ClockOutput>
    where
        S: Scheduler<E> + ?Sized,
    {
        self.cancel_timers(sched);
        self.channels.reset_all();
        self.phase = TrialPhase::Completed;
        info!(trials = self.trials.len(), "block finished");
        vec![ClockOutput::BlockFinished]
    }

    /// Cancels all timers, force-releases the sliders and discards every row
    /// recorded so far.
    pub fn interrupt<E, S>(&mut self, sched: &mut S) -> Vec<ClockOutput>
    where
        S: Scheduler<E> + ?Sized,
    {
        if self.phase.is_terminal() {
            return Vec::new();
        }
        self.cancel_timers(sched);
        let since = self.onset.map_or(f64::NAN, |_| self.since_onset(sched.now()));
        self.channels.disable_all(since);
        self.channels.reset_all();
        let discarded = self.trials.len() + usize::from(self.phase == TrialPhase::Active);
        self.trials.clear();
        self.onset = None;
        self.phase = TrialPhase::Interrupted;
        info!(discarded, "block interrupted");

        let mut out = self.channel_states(false);
        out.push(ClockOutput::Interrupted { discarded });
        out
    }

    fn cancel_timers<E, S>(&mut self, sched: &mut S)
    where
        S: Scheduler<E> + ?Sized,
    {
        if let Some(h) = self.tick.take() {
            sched.cancel(h);
        }
        if let Some(h) = self.begin.take() {
            sched.cancel(h);
        }
    }

    pub fn grab(&mut self, side: Side, touch: TouchId, now: f64) -> Vec<ClockOutput> {
        if !self.phase.allows_input() {
            return Vec::new();
        }
        let since = self.since_onset(now);
        if !self.channels[side].grab(touch, since) {
            return Vec::new();
        }
        vec![ClockOutput::Display(DisplayCommand::SetWarningVisible {
            warning: Warning::Unused(side),
            visible: !self.channels[side].was_grabbed(),
        })]
    }

    pub fn release(&mut self, side: Side, touch: TouchId, now: f64) -> Vec<ClockOutput> {
        let since = self.since_onset(now);
        if self.channels[side].release(touch, since) {
            vec![ClockOutput::Display(DisplayCommand::SetChannelEnabled {
                side,
                enabled: false,
            })]
        } else {
            Vec::new()
        }
    }

    pub fn leave(&mut self, side: Side, touch: TouchId, now: f64) -> Vec<ClockOutput> {
        self.release(side, touch, now)
    }

    pub fn move_to(&mut self, side: Side, touch: TouchId, value: f64) -> bool {
        self.channels[side].move_to(touch, value)
    }

    fn since_onset(&self, now: f64) -> f64 {
        self.onset.map_or(f64::NAN, |onset| now - onset)
    }

    fn channel_states(&self, enabled: bool) -> Vec<ClockOutput> {
        Side::BOTH
            .iter()
            .map(|&side| ClockOutput::Display(DisplayCommand::SetChannelEnabled { side, enabled }))
            .collect()
    }

    fn progress(&self) -> ClockOutput {
        ClockOutput::Display(DisplayCommand::SetProgress {
            trial: self.current_trial,
            of: self.max_trials,
        })
    }

    pub fn phase(&self) -> TrialPhase {
        self.phase
    }

    pub fn timing(&self) -> TrialTiming {
        self.timing
    }

    pub fn max_trials(&self) -> usize {
        self.max_trials
    }

    pub fn current_trial(&self) -> usize {
        self.current_trial
    }

    pub fn channels(&self) -> &ChannelPair {
        &self.channels
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn take_trials(&mut self) -> Vec<Trial> {
        std::mem::take(&mut self.trials)
    }
}
