use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Fraction of the range a channel is reset to before each trial.
pub const RESET_FRACTION: f64 = 0.1;

/// Which of the two sliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Left slider, first degree of freedom.
    Df1,
    /// Right slider, second degree of freedom.
    Df2,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Df1, Side::Df2];

    pub fn other(self) -> Side {
        match self {
            Side::Df1 => Side::Df2,
            Side::Df2 => Side::Df1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Df1 => "df1",
            Side::Df2 => "df2",
        }
    }
}

/// Identifier of a touch (pointer) as reported by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TouchId(pub u64);

/// One continuous control input.
///
/// Only one touch may own a channel at a time. Letting go of the handle, or
/// sliding off it, disables the channel for the remainder of the trial.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    side: Side,
    disabled: bool,
    value: f64,
    max: f64,
    owner: Option<TouchId>,
    grab_dt: f64,
    release_dt: f64,
}

impl ControlChannel {
    pub fn new(side: Side, max: f64) -> Self {
        Self {
            side,
            disabled: true,
            value: max * RESET_FRACTION,
            max,
            owner: None,
            grab_dt: f64::NAN,
            release_dt: f64::NAN,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn value_normalized(&self) -> f64 {
        if self.max > 0.0 { self.value / self.max } else { 0.0 }
    }

    pub fn owner(&self) -> Option<TouchId> {
        self.owner
    }

    /// Seconds after trial onset the channel was grabbed, `NaN` if never.
    pub fn grab_dt(&self) -> f64 {
        self.grab_dt
    }

    /// Seconds after trial onset the channel was released, `NaN` if never.
    pub fn release_dt(&self) -> f64 {
        self.release_dt
    }

    pub fn was_grabbed(&self) -> bool {
        !self.grab_dt.is_nan()
    }

    /// First grabber wins. Returns whether `touch` now owns the channel.
    pub fn grab(&mut self, touch: TouchId, since_onset: f64) -> bool {
        if self.disabled || self.owner.is_some() {
            return false;
        }
        self.owner = Some(touch);
        self.grab_dt = since_onset;
        true
    }

    /// Releases the channel if `touch` owns it. The channel stays disabled
    /// until the next trial enables it again.
    pub fn release(&mut self, touch: TouchId, since_onset: f64) -> bool {
        if self.owner != Some(touch) {
            return false;
        }
        self.disabled = true;
        self.release_dt = since_onset;
        self.owner = None;
        true
    }

    /// The pointer slid off the handle. Same as a release.
    pub fn leave(&mut self, touch: TouchId, since_onset: f64) -> bool {
        self.release(touch, since_onset)
    }

    /// Moves the handle. Only the owning touch can move an enabled channel.
    pub fn move_to(&mut self, touch: TouchId, value: f64) -> bool {
        if self.disabled || self.owner != Some(touch) || value.is_nan() {
            return false;
        }
        self.value = value.clamp(0.0, self.max);
        true
    }

    pub fn enable(&mut self) {
        self.disabled = false;
    }

    /// Disables regardless of ownership; a held channel is released at `since_onset`.
    pub fn disable(&mut self, since_onset: f64) {
        self.disabled = true;
        if self.owner.take().is_some() && self.release_dt.is_nan() {
            self.release_dt = since_onset;
        }
    }

    pub fn reset(&mut self) {
        self.value = self.max * RESET_FRACTION;
        self.grab_dt = f64::NAN;
        self.release_dt = f64::NAN;
    }
}

/// The two sliders of the circle task.
#[derive(Debug, Clone)]
pub struct ChannelPair {
    channels: [ControlChannel; 2],
}

impl ChannelPair {
    pub fn new(max: f64) -> Self {
        Self {
            channels: [
                ControlChannel::new(Side::Df1, max),
                ControlChannel::new(Side::Df2, max),
            ],
        }
    }

    pub fn enable_all(&mut self) {
        self.channels.iter_mut().for_each(ControlChannel::enable);
    }

    pub fn disable_all(&mut self, since_onset: f64) {
        for c in &mut self.channels {
            c.disable(since_onset);
        }
    }

    pub fn reset_all(&mut self) {
        self.channels.iter_mut().for_each(ControlChannel::reset);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControlChannel> {
        self.channels.iter()
    }
}

impl Default for ChannelPair {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Index<Side> for ChannelPair {
    type Output = ControlChannel;

    fn index(&self, side: Side) -> &ControlChannel {
        match side {
            Side::Df1 => &self.channels[0],
            Side::Df2 => &self.channels[1],
        }
    }
}

impl IndexMut<Side> for ChannelPair {
    fn index_mut(&mut self, side: Side) -> &mut ControlChannel {
        match side {
            Side::Df1 => &mut self.channels[0],
            Side::Df2 => &mut self.channels[1],
        }
    }
}
