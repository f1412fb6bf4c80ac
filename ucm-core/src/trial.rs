use crate::channel::{ChannelPair, Side};
use serde::{Deserialize, Serialize};

/// Which per-trial fields end up in the exported trials table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialLayout {
    /// Final slider values only.
    ValuesOnly,
    /// Values plus grab/release times of both sliders.
    #[default]
    Full,
}

impl TrialLayout {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            TrialLayout::ValuesOnly => &["df1", "df2"],
            TrialLayout::Full => &[
                "df1",
                "df2",
                "df1_grab",
                "df1_release",
                "df2_grab",
                "df2_release",
            ],
        }
    }
}

/// One recorded trial. Values are normalized (0..1), times are seconds
/// relative to trial onset and `NaN` when the event never happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    pub index: usize,
    pub df1_value: f64,
    pub df2_value: f64,
    pub df1_grab_dt: f64,
    pub df1_release_dt: f64,
    pub df2_grab_dt: f64,
    pub df2_release_dt: f64,
}

impl Trial {
    /// Snapshot of both channels at the end of the trial.
    pub fn capture(index: usize, channels: &ChannelPair) -> Self {
        let df1 = &channels[Side::Df1];
        let df2 = &channels[Side::Df2];
        Self {
            index,
            df1_value: df1.value_normalized(),
            df2_value: df2.value_normalized(),
            df1_grab_dt: df1.grab_dt(),
            df1_release_dt: df1.release_dt(),
            df2_grab_dt: df2.grab_dt(),
            df2_release_dt: df2.release_dt(),
        }
    }

    /// (grab, release) of one side.
    pub fn timing(&self, side: Side) -> (f64, f64) {
        match side {
            Side::Df1 => (self.df1_grab_dt, self.df1_release_dt),
            Side::Df2 => (self.df2_grab_dt, self.df2_release_dt),
        }
    }

    pub fn value(&self, side: Side) -> f64 {
        match side {
            Side::Df1 => self.df1_value,
            Side::Df2 => self.df2_value,
        }
    }

    pub fn row(&self, layout: TrialLayout) -> Vec<f64> {
        match layout {
            TrialLayout::ValuesOnly => vec![self.df1_value, self.df2_value],
            TrialLayout::Full => vec![
                self.df1_value,
                self.df2_value,
                self.df1_grab_dt,
                self.df1_release_dt,
                self.df2_grab_dt,
                self.df2_release_dt,
            ],
        }
    }
}
