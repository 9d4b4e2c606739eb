use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// 10 minute timesteps (6 * 10 = 60)
pub const TIMESTEPS_PER_HOUR: f64 = 6.0;

/// Zero-flow steps before the rising limb and after the falling limb.
pub const BUFFER_TIMESTEPS: usize = 5;

/// Minutes between consecutive points.
pub const TIME_STEP_MINUTES: i64 = 10;

/// Share of the falling limb spent dropping from the peak to a third of it.
pub const FIRST_STAGE_FACTOR: f64 = 1.0 / 3.0;

const INITIAL_FLOW: f64 = 0.0;
const DECIMALS: i32 = 2;

/// Synthetic epoch the series counts from. The first point falls one step later.
pub fn hydrograph_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2010, 6, 7)
        .and_then(|d| d.and_hms_opt(11, 50, 0))
        .unwrap_or_default()
}

/// Shape of a synthetic flood event.
///
/// Durations are in hours and flows in cubic meters per second. Values are not
/// validated: zero or negative durations simply produce empty phases.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct HydrographParameters {
    pub peak_flow: f64,
    pub time_to_peak: f64,
    pub peak_duration: f64,
    pub falling_limb_duration: f64,
}

impl Default for HydrographParameters {
    fn default() -> Self {
        HydrographParameters {
            peak_flow: 800.0,
            time_to_peak: 6.0,
            peak_duration: 6.0,
            falling_limb_duration: 24.0,
        }
    }
}

/// A single inflow value at a point in time.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct HydrographPoint {
    pub timestamp: NaiveDateTime,
    pub flow: f64,
}

/// Ordered inflow series, one point per timestep.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct Hydrograph {
    pub points: Vec<HydrographPoint>,
}

/// Number of timesteps covering `hours`, truncated toward zero.
pub fn phase_steps(hours: f64) -> usize {
    let steps = (hours * TIMESTEPS_PER_HOUR).trunc();
    if steps > 0.0 {
        steps as usize
    } else {
        0
    }
}

fn round_flow(flow: f64) -> f64 {
    let factor = 10f64.powi(DECIMALS);
    // ties go to even, so 15.625 becomes 15.62
    let rounded = (flow * factor).round_ties_even() / factor;
    // -0.0 would otherwise be written as "-0.000000"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

struct SeriesBuilder {
    date: NaiveDateTime,
    step: TimeDelta,
    points: Vec<HydrographPoint>,
}

impl SeriesBuilder {
    fn push(&mut self, flow: f64) {
        self.date += self.step;
        self.points.push(HydrographPoint {
            timestamp: self.date,
            flow,
        });
    }
}

impl Hydrograph {
    /// Build the six-phase synthetic flood hydrograph.
    ///
    /// Phases: leading buffer, linear rising limb, peak plateau, two-stage
    /// linear falling limb (peak to a third of peak, then to zero), trailing
    /// buffer.
    pub fn generate(params: &HydrographParameters) -> Hydrograph {
        let peak_flow = params.peak_flow;
        let mut series = SeriesBuilder {
            date: hydrograph_epoch(),
            step: TimeDelta::minutes(TIME_STEP_MINUTES),
            points: Vec::new(),
        };

        for _ in 0..BUFFER_TIMESTEPS {
            series.push(INITIAL_FLOW);
        }

        let steps = phase_steps(params.time_to_peak);
        let rise_rate = peak_flow / steps as f64;
        for i in 0..steps {
            series.push(round_flow(INITIAL_FLOW + rise_rate * (i + 1) as f64));
        }

        for _ in 0..phase_steps(params.peak_duration) {
            series.push(peak_flow);
        }

        let first_stage_flow = peak_flow * FIRST_STAGE_FACTOR;
        let first_stage_duration = params.falling_limb_duration * FIRST_STAGE_FACTOR;
        let steps = phase_steps(first_stage_duration);
        let rate = (peak_flow - first_stage_flow) / steps as f64;
        for i in 0..steps {
            series.push(round_flow(peak_flow - rate * (i + 1) as f64));
        }

        let second_stage_duration = params.falling_limb_duration - first_stage_duration;
        let steps = phase_steps(second_stage_duration);
        let rate = first_stage_flow / steps as f64;
        for i in 0..steps {
            series.push(round_flow(first_stage_flow - rate * (i + 1) as f64));
        }

        for _ in 0..BUFFER_TIMESTEPS {
            series.push(INITIAL_FLOW);
        }

        Hydrograph {
            points: series.points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn peak(&self) -> f64 {
        self.points.iter().map(|p| p.flow).fold(0.0, f64::max)
    }

    /// Simulated span from the first to the last point.
    pub fn duration(&self) -> TimeDelta {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => TimeDelta::zero(),
        }
    }
}
