//! Pure mapping from excluded-pause elapsed time to the breathing snapshot.
//!
//! Nothing here holds state across frames except [`CycleTracker`]; every
//! frame the controller calls [`derive_snapshot`] with the absolute elapsed
//! time, so dropped frames never accumulate error.

use anyhow::{bail, Result};
use serde::Serialize;
use std::f64::consts::PI;

use super::state::Lifecycle;
use super::technique::{Phase, PhaseTimings, Technique};

pub const MIN_RADIUS: f64 = 30.0;
pub const MAX_RADIUS: f64 = 120.0;

const OPACITY_BASE: f64 = 0.25;
const OPACITY_SPAN: f64 = 0.35;
const HOLD_PULSE_AMPLITUDE: f64 = 0.08;
pub const OPACITY_FLOOR: f64 = 0.20;
pub const OPACITY_CEILING: f64 = 0.65;
/// Opacity of the circle before a session starts.
pub const RESTING_OPACITY: f64 = 0.15;

/// How close to the end of an exhale the cycle position must be for a session
/// past its target to finish.
pub const COMPLETION_TOLERANCE_MS: f64 = 100.0;

const PHASES_PER_CYCLE: u64 = 4;

/// Sessions last between one and five minutes.
pub const MIN_DURATION_SECS: u64 = 60;
pub const MAX_DURATION_SECS: u64 = 300;

/// What a session was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub technique: Technique,
    pub duration_secs: u64,
}

impl SessionConfig {
    pub fn new(technique: Technique, duration_secs: u64) -> Self {
        Self {
            technique,
            duration_secs,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&self.duration_secs) {
            bail!(
                "duration must be between {} and {} seconds, got {}",
                MIN_DURATION_SECS,
                MAX_DURATION_SECS,
                self.duration_secs
            );
        }
        Ok(())
    }

    pub fn timings(&self) -> PhaseTimings {
        self.technique.timings()
    }

    pub fn target_ms(&self) -> f64 {
        (self.duration_secs * 1000) as f64
    }

    pub fn total_cycles(&self) -> u64 {
        self.timings().total_cycles(self.duration_secs)
    }
}

/// Symmetric ease-in-out curve on [0, 1].
pub fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// Circle radius for a size drive in [0, 1]. Interpolates area rather than
/// radius so that perceived growth is even.
pub fn radius_for(size_progress: f64) -> f64 {
    let min_area = MIN_RADIUS * MIN_RADIUS;
    let max_area = MAX_RADIUS * MAX_RADIUS;
    (min_area + size_progress * (max_area - min_area)).sqrt()
}

pub fn opacity_for(phase: Phase, linear_progress: f64, size_progress: f64) -> f64 {
    let mut opacity = OPACITY_BASE + size_progress * OPACITY_SPAN;
    if phase.is_hold() {
        // keeps holds from looking frozen
        opacity += (linear_progress * PI * 2.0).sin() * HOLD_PULSE_AMPLITUDE;
    }
    opacity.clamp(OPACITY_FLOOR, OPACITY_CEILING)
}

/// Where an elapsed time falls inside the breathing pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhasePosition {
    pub phase: Phase,
    pub linear_progress: f64,
    pub size_progress: f64,
    /// Zero-based cycle number.
    pub cycle: u64,
    pub cycle_position_ms: f64,
}

pub fn locate(timings: &PhaseTimings, elapsed_ms: f64) -> PhasePosition {
    let cycle_ms = timings.cycle_ms() as f64;
    let elapsed_ms = elapsed_ms.max(0.0);
    let cycle_position_ms = elapsed_ms % cycle_ms;
    let cycle = (elapsed_ms / cycle_ms).floor() as u64;

    let mut phase_start = 0.0;
    let mut phase = Phase::HoldOut;
    for candidate in Phase::CYCLE {
        let phase_end = phase_start + timings.duration_of(candidate) as f64;
        if cycle_position_ms < phase_end {
            phase = candidate;
            break;
        }
        phase_start = phase_end;
    }

    let linear_progress = (cycle_position_ms - phase_start) / timings.duration_of(phase) as f64;
    let size_progress = match phase {
        Phase::Inhale => ease_in_out(linear_progress),
        Phase::HoldIn => 1.0,
        Phase::Exhale => 1.0 - ease_in_out(linear_progress),
        Phase::HoldOut | Phase::Idle => 0.0,
    };

    PhasePosition {
        phase,
        linear_progress,
        size_progress,
        cycle,
        cycle_position_ms,
    }
}

/// True once the target duration has passed and the cycle sits at the end of
/// an exhale.
pub fn is_complete(config: &SessionConfig, elapsed_ms: f64) -> bool {
    if elapsed_ms < config.target_ms() {
        return false;
    }
    let timings = config.timings();
    let position = locate(&timings, elapsed_ms);
    (position.cycle_position_ms - timings.exhale_end_ms() as f64).abs() <= COMPLETION_TOLERANCE_MS
}

/// Text for the live announcement region.
pub fn announcement(lifecycle: Lifecycle, phase: Phase, technique: Technique) -> &'static str {
    match lifecycle {
        Lifecycle::Idle => Phase::Idle.label(technique),
        Lifecycle::Completing | Lifecycle::Ended => "",
        Lifecycle::Running | Lifecycle::Paused => phase.label(technique),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub lifecycle: Lifecycle,
    pub technique: Technique,
    pub phase: Phase,
    pub phase_index: usize,
    pub phase_progress: f64,
    pub radius: f64,
    pub opacity: f64,
    pub cycle_count: u64,
    pub total_cycles: u64,
    pub elapsed_ms: f64,
    pub label: &'static str,
}

impl SessionSnapshot {
    pub fn idle(config: &SessionConfig) -> Self {
        Self {
            lifecycle: Lifecycle::Idle,
            technique: config.technique,
            phase: Phase::Idle,
            phase_index: 0,
            phase_progress: 0.0,
            radius: MIN_RADIUS,
            opacity: RESTING_OPACITY,
            cycle_count: 0,
            total_cycles: config.total_cycles(),
            elapsed_ms: 0.0,
            label: announcement(Lifecycle::Idle, Phase::Idle, config.technique),
        }
    }

    /// Position on the bead ring drawn around the circle: one marker per phase
    /// of every planned cycle. A session running past its planned cycles
    /// while it waits for the exhale boundary shows the ring full.
    pub fn progress_ring(&self) -> ProgressRing {
        let total = self.total_cycles * PHASES_PER_CYCLE;
        let active = if self.lifecycle == Lifecycle::Idle {
            0
        } else {
            self.cycle_count * PHASES_PER_CYCLE + self.phase_index as u64
        };
        ProgressRing {
            total_markers: total,
            active_marker: active.min(total),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRing {
    pub total_markers: u64,
    /// Markers before this one are complete.
    pub active_marker: u64,
}

pub fn derive_snapshot(config: &SessionConfig, lifecycle: Lifecycle, elapsed_ms: f64) -> SessionSnapshot {
    if lifecycle == Lifecycle::Idle {
        return SessionSnapshot::idle(config);
    }

    let position = locate(&config.timings(), elapsed_ms);
    SessionSnapshot {
        lifecycle,
        technique: config.technique,
        phase: position.phase,
        phase_index: position.phase.index(),
        phase_progress: position.linear_progress,
        radius: radius_for(position.size_progress),
        opacity: opacity_for(position.phase, position.linear_progress, position.size_progress),
        cycle_count: position.cycle,
        total_cycles: config.total_cycles(),
        elapsed_ms,
        label: announcement(lifecycle, position.phase, config.technique),
    }
}

/// Remembers the last cycle number seen so per-cycle work runs once per cycle
/// no matter how often frames arrive.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleTracker {
    last_seen: Option<u64>,
}

impl CycleTracker {
    /// Returns true the first time `cycle` (or any later cycle) is observed.
    pub fn observe(&mut self, cycle: u64) -> bool {
        match self.last_seen {
            Some(last) if cycle <= last => false,
            _ => {
                self.last_seen = Some(cycle);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_seen = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn balanced() -> SessionConfig {
        SessionConfig::new(Technique::Balanced, 60)
    }

    fn long_exhale() -> SessionConfig {
        SessionConfig::new(Technique::LongExhale, 60)
    }

    #[test]
    fn start_of_session() {
        let snap = derive_snapshot(&balanced(), Lifecycle::Running, 0.0);
        assert_eq!(snap.phase, Phase::Inhale);
        assert_eq!(snap.phase_index, 0);
        assert_eq!(snap.radius, 30.0);
        assert!((snap.opacity - 0.25).abs() < EPS);
        assert_eq!(snap.cycle_count, 0);
    }

    #[test]
    fn mid_inhale_balanced() {
        let snap = derive_snapshot(&balanced(), Lifecycle::Running, 2000.0);
        assert_eq!(snap.phase, Phase::Inhale);
        assert!((snap.phase_progress - 0.5).abs() < EPS);
        assert!((snap.radius - 7650f64.sqrt()).abs() < EPS);
        assert!((snap.radius - 87.46).abs() < 0.01);
        assert!((snap.opacity - 0.425).abs() < EPS);
    }

    #[test]
    fn long_exhale_first_hold() {
        let snap = derive_snapshot(&long_exhale(), Lifecycle::Running, 4200.0);
        assert_eq!(snap.phase, Phase::HoldIn);
        assert_eq!(snap.phase_index, 1);
        assert!((snap.phase_progress - 0.4).abs() < EPS);
        assert_eq!(snap.label, "Inhale");
        assert_eq!(snap.radius, MAX_RADIUS);
    }

    #[test]
    fn phase_boundaries_balanced() {
        let timings = Technique::Balanced.timings();
        assert_eq!(locate(&timings, 3999.0).phase, Phase::Inhale);
        assert_eq!(locate(&timings, 4000.0).phase, Phase::HoldIn);
        assert_eq!(locate(&timings, 8000.0).phase, Phase::Exhale);
        assert_eq!(locate(&timings, 12_000.0).phase, Phase::HoldOut);
        let wrapped = locate(&timings, 16_000.0);
        assert_eq!(wrapped.phase, Phase::Inhale);
        assert_eq!(wrapped.cycle, 1);
    }

    #[test]
    fn exhale_eases_back_down() {
        let timings = Technique::Balanced.timings();
        let mid = locate(&timings, 10_000.0);
        assert_eq!(mid.phase, Phase::Exhale);
        assert!((mid.size_progress - 0.5).abs() < EPS);
        assert_eq!(locate(&timings, 13_000.0).size_progress, 0.0);
    }

    #[test]
    fn duration_bounds() {
        assert!(SessionConfig::new(Technique::Balanced, 60).validate().is_ok());
        assert!(SessionConfig::new(Technique::Balanced, 300).validate().is_ok());
        assert!(SessionConfig::new(Technique::Balanced, 0).validate().is_err());
        assert!(SessionConfig::new(Technique::Balanced, 301).validate().is_err());
    }

    #[test]
    fn radius_endpoints_are_exact() {
        assert_eq!(radius_for(0.0), 30.0);
        assert_eq!(radius_for(1.0), 120.0);
    }

    #[test]
    fn hold_pulse_is_clamped() {
        // top of the hold-in pulse would reach 0.68
        assert_eq!(opacity_for(Phase::HoldIn, 0.25, 1.0), OPACITY_CEILING);
        // bottom of the hold-out pulse would reach 0.17
        assert_eq!(opacity_for(Phase::HoldOut, 0.75, 0.0), OPACITY_FLOOR);
    }

    #[test]
    fn completion_waits_for_exhale_boundary() {
        let config = balanced();
        // 60 s lands exactly on the end of the fourth exhale
        assert!(is_complete(&config, 60_000.0));
        assert!(is_complete(&config, 60_100.0));
        assert!(!is_complete(&config, 60_101.0));
        // near a boundary but before the target
        assert!(!is_complete(&config, 44_000.0));
    }

    #[test]
    fn long_exhale_runs_past_target() {
        let config = long_exhale();
        // 60 s is mid-exhale of the fifth cycle
        assert!(!is_complete(&config, 60_000.0));
        assert!(!is_complete(&config, 64_399.0));
        assert!(is_complete(&config, 64_500.0));
    }

    #[test]
    fn idle_snapshot_is_resting() {
        let snap = derive_snapshot(&balanced(), Lifecycle::Idle, 5000.0);
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(snap.radius, MIN_RADIUS);
        assert_eq!(snap.opacity, RESTING_OPACITY);
        assert_eq!(snap.label, "Ready");
        assert_eq!(snap.total_cycles, 4);
    }

    #[test]
    fn completing_snapshot_has_no_label() {
        let snap = derive_snapshot(&balanced(), Lifecycle::Completing, 60_000.0);
        assert_eq!(snap.label, "");
    }

    #[test]
    fn progress_ring_tracks_phase() {
        let snap = derive_snapshot(&balanced(), Lifecycle::Running, 16_000.0 + 9000.0);
        let ring = snap.progress_ring();
        assert_eq!(ring.total_markers, 16);
        assert_eq!(ring.active_marker, 6);
    }

    #[test]
    fn progress_ring_is_full_in_overtime() {
        // 64 s plans four 16 s cycles; completion lands in the fifth exhale
        let config = SessionConfig::new(Technique::Balanced, 64);
        let snap = derive_snapshot(&config, Lifecycle::Completing, 75_904.0);
        assert_eq!(snap.cycle_count, 4);
        let ring = snap.progress_ring();
        assert_eq!(ring.total_markers, 16);
        assert_eq!(ring.active_marker, 16);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snap = derive_snapshot(&long_exhale(), Lifecycle::Running, 0.0);
        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["lifecycle"], "running");
        assert_eq!(value["technique"], "longExhale");
        assert_eq!(value["phaseIndex"], 0);
        assert!(value.get("cycleCount").is_some());
    }

    #[test]
    fn tracker_fires_once_per_cycle() {
        let mut tracker = CycleTracker::default();
        assert!(tracker.observe(0));
        assert!(!tracker.observe(0));
        assert!(tracker.observe(1));
        assert!(!tracker.observe(1));
        assert!(!tracker.observe(0));
        tracker.reset();
        assert!(tracker.observe(0));
    }

    proptest! {
        #[test]
        fn phases_partition_the_cycle(elapsed in 0.0f64..200_000.0, long in any::<bool>()) {
            let technique = if long { Technique::LongExhale } else { Technique::Balanced };
            let timings = technique.timings();
            let position = locate(&timings, elapsed);
            prop_assert!(Phase::CYCLE.contains(&position.phase));
            prop_assert!(position.linear_progress >= 0.0 && position.linear_progress <= 1.0);

            let start: u64 = Phase::CYCLE
                .iter()
                .take_while(|p| **p != position.phase)
                .map(|p| timings.duration_of(*p))
                .sum();
            let end = start + timings.duration_of(position.phase);
            prop_assert!(position.cycle_position_ms >= start as f64);
            prop_assert!(position.cycle_position_ms < end as f64);
        }

        #[test]
        fn radius_is_monotonic(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(radius_for(lo) <= radius_for(hi));
            prop_assert!(radius_for(lo) >= MIN_RADIUS && radius_for(hi) <= MAX_RADIUS);
        }

        #[test]
        fn opacity_stays_in_range(elapsed in 0.0f64..200_000.0, long in any::<bool>()) {
            let technique = if long { Technique::LongExhale } else { Technique::Balanced };
            let snap = derive_snapshot(&SessionConfig::new(technique, 60), Lifecycle::Running, elapsed);
            prop_assert!(snap.opacity >= OPACITY_FLOOR && snap.opacity <= OPACITY_CEILING);
        }

        #[test]
        fn no_completion_away_from_exhale_end(elapsed in 60_000.0f64..400_000.0, long in any::<bool>()) {
            let technique = if long { Technique::LongExhale } else { Technique::Balanced };
            let config = SessionConfig::new(technique, 60);
            let timings = config.timings();
            let position = locate(&timings, elapsed);
            let distance = (position.cycle_position_ms - timings.exhale_end_ms() as f64).abs();
            if distance > COMPLETION_TOLERANCE_MS {
                prop_assert!(!is_complete(&config, elapsed));
            }
        }

        #[test]
        fn cycle_counter_increments_once_per_cycle(steps in prop::collection::vec(1.0f64..900.0, 1..400)) {
            let timings = Technique::LongExhale.timings();
            let mut tracker = CycleTracker::default();
            let mut elapsed = 0.0;
            let mut last_observed = 0.0;
            let mut increments = 0u64;
            // steps are shorter than a cycle, so no cycle is skipped
            for step in steps {
                if tracker.observe(locate(&timings, elapsed).cycle) {
                    increments += 1;
                }
                last_observed = elapsed;
                elapsed += step;
            }
            prop_assert_eq!(increments, locate(&timings, last_observed).cycle + 1);
        }
    }
}
