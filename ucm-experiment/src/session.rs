//! One participant session of the circle task: blocks of trials, the rating
//! after each block, and hand-over of finished blocks to the data collection.

use crate::block::{BlockController, BlockPlan};
use crate::clock::{ClockOutput, ClockTimer, TrialClock, TrialTiming};
use crate::validity::{BlockVerdict, TrialCheck, check_block};
use rand::Rng;
use tracing::{info, warn};
use ucm_core::{
    AppContext, DisplayCommand, Error, InvalidBlockPolicy, Notification, Result, Side, TouchId,
    Warning,
};
use ucm_data::{DataCollection, RecordMeta, SessionRow, Timestamp, finalize_trials};
use ucm_timing::Scheduler;

pub const INVALID_BLOCK_MESSAGE: &str =
    "Please read instructions again carefully and perform task accordingly.\nAborting Session...";
pub const PRACTICE_MORE_MESSAGE: &str = "If the task was too difficult for you, go back and start over to practice some more.\nYou can also increase the number of practice trials in the settings, if you really need to.";

/// Participant input forwarded by the task screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Grab { side: Side, touch: TouchId },
    Release { side: Side, touch: TouchId },
    /// The touch slid off the slider handle.
    Leave { side: Side, touch: TouchId },
    Move { side: Side, touch: TouchId, value: f64 },
    CountdownFinished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Display(DisplayCommand),
    Notify(Notification),
    BlockStarted { plan: BlockPlan },
    TrialStarted { index: usize },
    TrialFinished { index: usize, check: TrialCheck },
    BlockInvalid { index: usize, never_used: Vec<Side> },
    /// The block is done; answer with [`CircleTask::submit_rating`].
    RatingRequested { index: usize },
    TaskStopped { was_last_block: bool },
    Interrupted { discarded: usize },
}

pub struct CircleTask<R: Rng> {
    user: String,
    task: String,
    device_id: String,
    blocks: BlockController<R>,
    clock: Option<TrialClock>,
    session_rows: Vec<SessionRow>,
    awaiting_rating: bool,
    retry_pending: bool,
    finished: bool,
}

impl<R: Rng> CircleTask<R> {
    pub fn new(ctx: &AppContext, rng: R) -> Self {
        Self {
            user: ctx.settings.current_user.clone(),
            task: ctx.settings.current_task.clone(),
            device_id: ctx.device.id(),
            blocks: BlockController::new(ctx.settings.circle_task.clone(), rng),
            clock: None,
            session_rows: Vec::new(),
            awaiting_rating: false,
            retry_pending: false,
            finished: false,
        }
    }

    /// Plans the next block (or repeats an invalid one) and starts its clock.
    pub fn begin_block<E, S>(&mut self, sched: &mut S) -> Result<Vec<SessionEvent>>
    where
        E: From<ClockTimer>,
        S: Scheduler<E> + ?Sized,
    {
        if self.finished {
            return Err(Error::InvalidState("session already finished".into()));
        }
        if self.awaiting_rating || self.clock.as_ref().is_some_and(|c| c.phase().is_running()) {
            return Err(Error::InvalidState("previous block not finished".into()));
        }
        let plan = if std::mem::take(&mut self.retry_pending) {
            self.blocks.repeat_block().clone()
        } else {
            self.blocks.next_block().clone()
        };

        let timing = TrialTiming::from_settings(self.blocks.settings());
        let mut clock = TrialClock::new(timing, plan.max_trials);
        let mut out = vec![SessionEvent::BlockStarted { plan }];
        // Remind the participant to use both sliders.
        out.extend(Side::BOTH.iter().map(|&side| {
            SessionEvent::Display(DisplayCommand::SetWarningVisible {
                warning: Warning::Unused(side),
                visible: true,
            })
        }));
        let started = clock.start(sched);
        self.clock = Some(clock);
        out.extend(self.translate(started));
        Ok(out)
    }

    pub fn on_timer<E, S>(
        &mut self,
        timer: ClockTimer,
        sched: &mut S,
        data: &mut DataCollection,
    ) -> Vec<SessionEvent>
    where
        E: From<ClockTimer>,
        S: Scheduler<E> + ?Sized,
    {
        let Some(clock) = self.clock.as_mut() else {
            return Vec::new();
        };
        let outputs = clock.on_timer(timer, sched);
        let finished = outputs.contains(&ClockOutput::BlockFinished);
        let mut out = self.translate(outputs);
        if finished {
            out.extend(self.finish_block(data));
        }
        out
    }

    pub fn on_input<E, S>(&mut self, input: InputEvent, sched: &mut S) -> Vec<SessionEvent>
    where
        S: Scheduler<E> + ?Sized,
    {
        let now = sched.now();
        let Some(clock) = self.clock.as_mut() else {
            return Vec::new();
        };
        let outputs = match input {
            InputEvent::Grab { side, touch } => clock.grab(side, touch, now),
            InputEvent::Release { side, touch } => clock.release(side, touch, now),
            InputEvent::Leave { side, touch } => clock.leave(side, touch, now),
            InputEvent::Move { side, touch, value } => {
                clock.move_to(side, touch, value);
                Vec::new()
            }
            InputEvent::CountdownFinished => clock.countdown_finished(now),
        };
        self.translate(outputs)
    }

    fn finish_block(&mut self, data: &mut DataCollection) -> Vec<SessionEvent> {
        let Some(plan) = self.blocks.current().cloned() else {
            return Vec::new();
        };
        let layout = self.blocks.settings().layout;
        let trials = self.clock.as_ref().map(TrialClock::trials).unwrap_or_default();

        match check_block(trials, layout) {
            BlockVerdict::Valid => {
                self.awaiting_rating = true;
                vec![SessionEvent::RatingRequested { index: plan.index }]
            }
            BlockVerdict::Invalid { never_used } => {
                warn!(block = plan.index, ?never_used, "block invalid, discarding its data");
                if let Some(clock) = self.clock.as_mut() {
                    clock.take_trials();
                }
                let mut out = vec![
                    SessionEvent::Notify(Notification::Warning(INVALID_BLOCK_MESSAGE.into())),
                    SessionEvent::BlockInvalid {
                        index: plan.index,
                        never_used,
                    },
                ];
                match self.blocks.settings().invalid_block_policy {
                    InvalidBlockPolicy::AbortSession => {
                        data.mark_invalid();
                        self.session_rows.clear();
                        self.finished = true;
                        out.push(SessionEvent::TaskStopped {
                            was_last_block: true,
                        });
                    }
                    InvalidBlockPolicy::RetryBlock => {
                        self.retry_pending = true;
                        out.push(SessionEvent::TaskStopped {
                            was_last_block: false,
                        });
                    }
                }
                out
            }
        }
    }

    /// Stores the difficulty rating (1 to 5, `None` if dismissed) and hands a
    /// scored block to the data collection.
    pub fn submit_rating(
        &mut self,
        rating: Option<u8>,
        data: &mut DataCollection,
    ) -> Result<Vec<SessionEvent>> {
        if !self.awaiting_rating {
            return Err(Error::InvalidState("no block awaiting a rating".into()));
        }
        if let Some(r) = rating.filter(|r| !(1..=5).contains(r)) {
            return Err(Error::InvalidState(format!("rating {r} out of range")));
        }
        let plan = self
            .blocks
            .current()
            .cloned()
            .ok_or_else(|| Error::InvalidState("no current block".into()))?;
        self.awaiting_rating = false;

        let mut out = Vec::new();
        if plan.is_practice {
            if rating.is_some_and(|r| r > 3) {
                out.push(SessionEvent::Notify(Notification::Info {
                    title: "Info".into(),
                    text: PRACTICE_MORE_MESSAGE.into(),
                }));
            }
        } else {
            self.collect_block(&plan, rating, data);
        }

        let was_last_block = self.blocks.is_last_block();
        if was_last_block {
            let ts = Timestamp::now();
            let meta = RecordMeta {
                task: Some(self.task.clone()),
                user: Some(self.user.clone()),
                ..RecordMeta::at(&ts)
            };
            data.add_session(&self.session_rows, meta);
            self.session_rows.clear();
            self.finished = true;
        }
        info!(block = plan.index, ?rating, was_last_block, "block done");
        out.push(SessionEvent::TaskStopped { was_last_block });
        Ok(out)
    }

    fn collect_block(&mut self, plan: &BlockPlan, rating: Option<u8>, data: &mut DataCollection) {
        let settings = self.blocks.settings();
        let trials = self.clock.as_mut().map(TrialClock::take_trials).unwrap_or_default();
        let table = finalize_trials(&trials, settings.layout);
        let hash = table.hash();
        let ts = Timestamp::now();
        let treatment = plan.treatment();

        self.session_rows.push(SessionRow {
            task: self.task.clone(),
            time: ts.unix,
            time_iso: ts.iso.clone(),
            block: plan.export_number,
            treatment: treatment.clone(),
            hash: hash.clone(),
            warm_up: settings.warm_up,
            trial_duration: settings.trial_duration,
            cool_down: settings.cool_down,
            rating,
        });
        let meta = RecordMeta {
            device: Some(self.device_id.clone()),
            user: Some(self.user.clone()),
            task: Some(self.task.clone()),
            block: Some(plan.export_number),
            treatment: Some(treatment),
            hash: Some(hash),
            rating,
            ..RecordMeta::at(&ts)
        };
        data.add_trials(&table, meta);
    }

    /// Stops the running block. Everything recorded in this session is
    /// dropped, including tables of blocks that were already scored.
    pub fn interrupt<E, S>(&mut self, sched: &mut S, data: &mut DataCollection) -> Vec<SessionEvent>
    where
        S: Scheduler<E> + ?Sized,
    {
        let outputs = match self.clock.as_mut() {
            Some(clock) => clock.interrupt(sched),
            None => Vec::new(),
        };
        data.discard_session();
        self.session_rows.clear();
        self.awaiting_rating = false;
        self.finished = true;
        self.translate(outputs)
    }

    /// Prepares for a new session from the first block.
    pub fn reset(&mut self) {
        self.blocks.reset();
        self.clock = None;
        self.session_rows.clear();
        self.awaiting_rating = false;
        self.retry_pending = false;
        self.finished = false;
    }

    fn translate(&self, outputs: Vec<ClockOutput>) -> Vec<SessionEvent> {
        outputs
            .into_iter()
            .filter_map(|o| match o {
                ClockOutput::Display(cmd) => Some(SessionEvent::Display(cmd)),
                ClockOutput::TrialStarted { index } => Some(SessionEvent::TrialStarted { index }),
                ClockOutput::TrialFinished { index, check } => {
                    Some(SessionEvent::TrialFinished { index, check })
                }
                ClockOutput::Interrupted { discarded } => {
                    Some(SessionEvent::Interrupted { discarded })
                }
                ClockOutput::BlockFinished => None,
            })
            .collect()
    }

    pub fn current_block(&self) -> Option<&BlockPlan> {
        self.blocks.current()
    }

    pub fn clock(&self) -> Option<&TrialClock> {
        self.clock.as_ref()
    }

    pub fn is_awaiting_rating(&self) -> bool {
        self.awaiting_rating
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn total_blocks(&self) -> usize {
        self.blocks.total_blocks()
    }
}
