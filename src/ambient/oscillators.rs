use serde::Serialize;
use std::f64::consts::TAU;

use crate::breathing::{Lifecycle, MIN_RADIUS};

const IDLE_STEP_RAD: f64 = 0.012;
const SWEEP_STEPS: u8 = 100;

/// Slow sine driving the resting circle shown before a session starts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IdlePulse {
    theta: f64,
}

impl IdlePulse {
    pub fn step(&mut self) {
        self.theta = (self.theta + IDLE_STEP_RAD) % TAU;
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn pulse(&self) -> f64 {
        0.5 + self.theta.sin() * 0.12
    }

    pub fn circle(&self) -> RestingCircle {
        RestingCircle {
            radius: MIN_RADIUS + self.pulse() * 50.0,
            opacity: 0.65 + self.theta.sin() * 0.1,
        }
    }
}

/// Highlight position sweeping across the start button, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightSweep {
    percent: u8,
}

impl HighlightSweep {
    pub fn step(&mut self) {
        self.percent = (self.percent + 1) % SWEEP_STEPS;
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestingCircle {
    pub radius: f64,
    pub opacity: f64,
}

impl RestingCircle {
    pub const STILL: RestingCircle = RestingCircle {
        radius: 55.0,
        opacity: 0.75,
    };

    pub const HIDDEN: RestingCircle = RestingCircle {
        radius: MIN_RADIUS,
        opacity: 0.0,
    };
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AmbientFrame {
    pub circle: RestingCircle,
    pub sweep_percent: u8,
    pub animated: bool,
}

impl Default for AmbientFrame {
    fn default() -> Self {
        compose(&IdlePulse::default(), &HighlightSweep::default(), false, Lifecycle::Idle)
    }
}

/// Whether the oscillators should advance on this tick.
pub fn should_animate(reduced_motion: bool, lifecycle: Lifecycle) -> bool {
    !reduced_motion && lifecycle == Lifecycle::Idle
}

pub fn compose(
    pulse: &IdlePulse,
    sweep: &HighlightSweep,
    reduced_motion: bool,
    lifecycle: Lifecycle,
) -> AmbientFrame {
    if matches!(lifecycle, Lifecycle::Completing | Lifecycle::Ended) {
        return AmbientFrame {
            circle: RestingCircle::HIDDEN,
            sweep_percent: 0,
            animated: false,
        };
    }
    if reduced_motion {
        return AmbientFrame {
            circle: RestingCircle::STILL,
            sweep_percent: 0,
            animated: false,
        };
    }
    AmbientFrame {
        circle: pulse.circle(),
        sweep_percent: sweep.percent(),
        animated: lifecycle == Lifecycle::Idle,
    }
}
