use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Technique {
    /// Box breathing: four equal 4 s phases.
    Balanced,
    /// Short inhale, long exhale, near-instantaneous holds.
    LongExhale,
}

impl Default for Technique {
    fn default() -> Self {
        Technique::Balanced
    }
}

impl Technique {
    pub fn timings(self) -> PhaseTimings {
        match self {
            Technique::Balanced => PhaseTimings {
                inhale_ms: 4000,
                hold_in_ms: 4000,
                exhale_ms: 4000,
                hold_out_ms: 4000,
            },
            Technique::LongExhale => PhaseTimings {
                inhale_ms: 4000,
                hold_in_ms: 500,
                exhale_ms: 8000,
                hold_out_ms: 500,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Technique::Balanced => "balanced",
            Technique::LongExhale => "longExhale",
        }
    }
}

/// Phase durations of one cycle, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTimings {
    pub inhale_ms: u64,
    pub hold_in_ms: u64,
    pub exhale_ms: u64,
    pub hold_out_ms: u64,
}

impl PhaseTimings {
    pub fn cycle_ms(&self) -> u64 {
        self.inhale_ms + self.hold_in_ms + self.exhale_ms + self.hold_out_ms
    }

    /// Offset within a cycle at which the exhale finishes.
    pub fn exhale_end_ms(&self) -> u64 {
        self.inhale_ms + self.hold_in_ms + self.exhale_ms
    }

    pub fn duration_of(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Idle => 0,
            Phase::Inhale => self.inhale_ms,
            Phase::HoldIn => self.hold_in_ms,
            Phase::Exhale => self.exhale_ms,
            Phase::HoldOut => self.hold_out_ms,
        }
    }

    /// Number of cycles needed to cover `duration_secs`, rounding up.
    pub fn total_cycles(&self, duration_secs: u64) -> u64 {
        (duration_secs * 1000).div_ceil(self.cycle_ms())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    Inhale,
    /// Hold after the inhale.
    HoldIn,
    Exhale,
    /// Hold after the exhale.
    HoldOut,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle
    }
}

impl Phase {
    /// The four breathing phases in cycle order.
    pub const CYCLE: [Phase; 4] = [Phase::Inhale, Phase::HoldIn, Phase::Exhale, Phase::HoldOut];

    pub fn index(self) -> usize {
        match self {
            Phase::Idle | Phase::Inhale => 0,
            Phase::HoldIn => 1,
            Phase::Exhale => 2,
            Phase::HoldOut => 3,
        }
    }

    pub fn is_hold(self) -> bool {
        matches!(self, Phase::HoldIn | Phase::HoldOut)
    }

    /// Display text for a breathing phase. Long-exhale holds are too short to
    /// read as a step of their own, so they keep the label of the phase that
    /// just ended.
    pub fn label(self, technique: Technique) -> &'static str {
        match (self, technique) {
            (Phase::Idle, _) => "Ready",
            (Phase::Inhale, _) => "Inhale",
            (Phase::Exhale, _) => "Exhale",
            (Phase::HoldIn, Technique::LongExhale) => "Inhale",
            (Phase::HoldOut, Technique::LongExhale) => "Exhale",
            (Phase::HoldIn | Phase::HoldOut, Technique::Balanced) => "Hold",
        }
    }
}
