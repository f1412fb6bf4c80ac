use crate::participant::SimulatedParticipant;
use anyhow::{Context, Result};
use rand::Rng;
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use ucm_core::{
    AppContext, DisplayCommand, EventBus, Notification, Presenter, Warning,
};
use ucm_data::{DataCollection, Timestamp, UserProfile};
use ucm_experiment::{CircleTask, ClockTimer, InputEvent, SessionEvent};
use ucm_export::{ExportReport, ExportRouter, HttpTransport, OutboxComposer};
use ucm_timing::{Scheduler, TimingStats};

/// Everything the event loop can be woken by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    Clock(ClockTimer),
    Participant(InputEvent),
    /// The app lost focus; the running block is abandoned.
    Interrupt,
}

impl From<ClockTimer> for AppEvent {
    fn from(timer: ClockTimer) -> Self {
        AppEvent::Clock(timer)
    }
}

impl From<InputEvent> for AppEvent {
    fn from(input: InputEvent) -> Self {
        AppEvent::Participant(input)
    }
}

/// Writes what a task screen would show to the log.
#[derive(Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn display(&mut self, command: &DisplayCommand) {
        match command {
            DisplayCommand::SetCountdownLabel(label) => debug!(?label, "countdown label"),
            DisplayCommand::StartCountdown { seconds } => debug!(seconds, "countdown started"),
            DisplayCommand::SetChannelEnabled { side, enabled } => {
                debug!(side = side.as_str(), enabled, "slider")
            }
            DisplayCommand::SetWarningVisible { warning, visible } => match warning {
                Warning::Concurrency if *visible => info!("sliders were not used together"),
                _ => debug!(?warning, visible, "warning"),
            },
            DisplayCommand::SetProgress { trial, of } => debug!("trial {trial}/{of}"),
        }
    }

    fn notify(&mut self, notification: &Notification) {
        match notification {
            Notification::Info { title, text } => info!(%title, "{text}"),
            Notification::Warning(text) => warn!("{text}"),
            Notification::Error(text) => error!("{text}"),
            Notification::Success(text) => info!("{text}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    /// Stopped because a block showed that a slider was never used.
    Invalid,
    Interrupted { discarded: usize },
}

pub struct App<R: Rng> {
    ctx: AppContext,
    task: CircleTask<R>,
    participant: SimulatedParticipant<R>,
    data: DataCollection,
    bus: EventBus<SessionEvent>,
    interrupt_after: Option<f64>,
}

impl<R: Rng> App<R> {
    pub fn new(ctx: AppContext, task_rng: R, participant: SimulatedParticipant<R>) -> Self {
        let mut bus = EventBus::new();
        let mut presenter = LogPresenter;
        bus.subscribe(move |event: &SessionEvent| match event {
            SessionEvent::Display(command) => presenter.display(command),
            SessionEvent::Notify(notification) => presenter.notify(notification),
            _ => {}
        });
        bus.subscribe(|event: &SessionEvent| match event {
            SessionEvent::BlockStarted { plan } => info!(
                block = plan.index,
                practice = plan.is_practice,
                trials = plan.max_trials,
                treatment = %plan.treatment(),
                "block started"
            ),
            SessionEvent::BlockInvalid { index, never_used } => {
                warn!(block = index, ?never_used, "block invalid")
            }
            SessionEvent::TrialFinished { index, check } => debug!(index, ?check, "trial finished"),
            SessionEvent::Interrupted { discarded } => warn!(discarded, "block interrupted"),
            _ => {}
        });

        let task = CircleTask::new(&ctx, task_rng);
        Self {
            ctx,
            task,
            participant,
            data: DataCollection::new(),
            bus,
            interrupt_after: None,
        }
    }

    /// Simulates the app being sent to the background after `seconds`.
    pub fn interrupt_after(mut self, seconds: Option<f64>) -> Self {
        self.interrupt_after = seconds;
        self
    }

    pub fn data(&self) -> &DataCollection {
        &self.data
    }

    /// Runs every block of one session to its end.
    pub fn run_session<S>(&mut self, profile: &UserProfile, sched: &mut S) -> Result<SessionOutcome>
    where
        S: Scheduler<AppEvent> + ?Sized,
    {
        let ts = Timestamp::now();
        self.data
            .new_collection(&self.ctx.settings.current_user, &self.ctx.device, &ts);
        self.data
            .add_user_data(profile, &self.ctx.settings.current_task, &ts);
        self.task.reset();
        info!(
            user = %self.ctx.settings.current_user,
            task = %self.ctx.settings.current_task,
            blocks = self.task.total_blocks(),
            "session started"
        );

        if let Some(seconds) = self.interrupt_after {
            sched.schedule_once(seconds, AppEvent::Interrupt);
        }
        let mut queue: VecDeque<SessionEvent> = self.task.begin_block(sched)?.into();
        let mut outcome = SessionOutcome::Completed;
        loop {
            while let Some(event) = queue.pop_front() {
                self.bus.emit(&event);
                self.participant.react(&event, sched);
                match event {
                    SessionEvent::RatingRequested { index } => {
                        let rating = self.participant.rate();
                        info!(block = index, ?rating, "difficulty rated");
                        queue.extend(self.task.submit_rating(rating, &mut self.data)?);
                    }
                    SessionEvent::TaskStopped { .. } if !self.task.is_finished() => {
                        queue.extend(self.task.begin_block(sched)?);
                    }
                    SessionEvent::Interrupted { discarded } => {
                        outcome = SessionOutcome::Interrupted { discarded };
                    }
                    _ => {}
                }
            }
            if self.task.is_finished() {
                break;
            }
            let Some(event) = sched.step(f64::INFINITY) else {
                warn!("event loop ran dry before the session ended");
                break;
            };
            let events = match event {
                AppEvent::Clock(timer) => self.task.on_timer(timer, sched, &mut self.data),
                AppEvent::Participant(input) => self.task.on_input(input, sched),
                AppEvent::Interrupt => self.task.interrupt(sched, &mut self.data),
            };
            queue.extend(events);
        }

        if outcome == SessionOutcome::Completed && self.data.is_invalid() {
            outcome = SessionOutcome::Invalid;
        }
        info!(?outcome, records = self.data.records().len(), "session ended");
        Ok(outcome)
    }

    /// Sends the collected data through every enabled channel.
    pub async fn export(&mut self, outbox: PathBuf) -> Result<ExportReport> {
        let transport = HttpTransport::new().context("Failed to set up the upload client")?;
        let mut router = ExportRouter::new(&self.ctx, transport, OutboxComposer::new(outbox));
        let report = router.export(&mut self.data).await;
        for notification in report.notifications() {
            self.bus.emit(&SessionEvent::Notify(notification));
        }
        Ok(report)
    }
}

pub fn log_timing(stats: &TimingStats) {
    if stats.samples == 0 {
        return;
    }
    info!(
        samples = stats.samples,
        avg_us = stats.average_lateness_ns / 1_000.0,
        jitter_us = stats.jitter_ns / 1_000.0,
        max_us = stats.max_lateness_ns / 1_000.0,
        "timer lateness"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use ucm_core::config::CircleTaskSettings;
    use ucm_core::{DeviceInfo, InvalidBlockPolicy, Settings};
    use ucm_data::TableKind;
    use ucm_timing::ManualScheduler;

    fn app(circle_task: CircleTaskSettings, neglect: f64) -> App<StdRng> {
        let settings = Settings {
            current_user: "u1".into(),
            circle_task,
            ..Settings::default()
        };
        let ctx = AppContext::new(settings, DeviceInfo::default());
        let participant = SimulatedParticipant::new(StdRng::seed_from_u64(7), 3.0, neglect);
        App::new(ctx, StdRng::seed_from_u64(8), participant)
    }

    fn short() -> CircleTaskSettings {
        CircleTaskSettings {
            n_trials: 3,
            n_practice_trials: 2,
            n_blocks: 2,
            ..CircleTaskSettings::default()
        }
    }

    #[test]
    fn simulated_session_completes() {
        let mut app = app(short(), 0.0);
        let mut s = ManualScheduler::new();
        let outcome = app.run_session(&UserProfile::default(), &mut s).unwrap();
        assert_eq!(outcome, SessionOutcome::Completed);

        let tables: Vec<TableKind> = app.data().records().iter().map(|r| r.table).collect();
        assert_eq!(tables.first(), Some(&TableKind::Device));
        assert_eq!(tables.last(), Some(&TableKind::Session));
        assert_eq!(
            tables.iter().filter(|t| **t == TableKind::Trials).count(),
            2
        );
    }

    #[test]
    fn ignored_slider_ends_session_as_invalid() {
        let mut app = app(short(), 1.0);
        let mut s = ManualScheduler::new();
        let outcome = app.run_session(&UserProfile::default(), &mut s).unwrap();
        assert_eq!(outcome, SessionOutcome::Invalid);
        assert!(app.data().is_invalid());
    }

    #[test]
    fn retry_policy_keeps_going_until_interrupted() {
        let settings = CircleTaskSettings {
            invalid_block_policy: InvalidBlockPolicy::RetryBlock,
            ..short()
        };
        let mut app = app(settings, 1.0).interrupt_after(Some(60.0));
        let mut s = ManualScheduler::new();
        let outcome = app.run_session(&UserProfile::default(), &mut s).unwrap();
        assert!(matches!(outcome, SessionOutcome::Interrupted { .. }));
        assert!(
            !app.data()
                .records()
                .iter()
                .any(|r| r.table == TableKind::Trials)
        );
    }

    #[test]
    fn interrupt_in_a_later_block_drops_scored_blocks() {
        // Block 3 is scored by 45s; block 4 is running at 50s.
        let mut app = app(short(), 0.0).interrupt_after(Some(50.0));
        let mut s = ManualScheduler::new();
        let outcome = app.run_session(&UserProfile::default(), &mut s).unwrap();
        assert!(matches!(outcome, SessionOutcome::Interrupted { .. }));

        let tables: Vec<TableKind> = app.data().records().iter().map(|r| r.table).collect();
        assert_eq!(tables, [TableKind::Device, TableKind::User]);
        assert!(app.data().is_interrupted());
    }

    #[test]
    fn interrupt_stops_the_session() {
        let mut app = app(short(), 0.0).interrupt_after(Some(7.0));
        let mut s = ManualScheduler::new();
        let outcome = app.run_session(&UserProfile::default(), &mut s).unwrap();
        assert_eq!(outcome, SessionOutcome::Interrupted { discarded: 1 });
        assert_eq!(app.data().records().len(), 2);
    }
}
