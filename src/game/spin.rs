//! Speed controller for the prize reel.
//!
//! A spin is a scalar problem: the flow layer decides up front how far the
//! reel has to scroll (`goal_distance`) and the simulator only has to get
//! there. Speed follows a cruise curve while far away, then hands over to a
//! damped spring for the last fraction of a rotation so the reel visibly
//! overshoots a hair and eases back instead of stopping dead.

use log::debug;
use rand::{Rng, RngExt};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationPhase {
    Idle,
    RampUp,
    Cruise,
    FinalApproach,
    Settled,
}

/// Maps wind-down progress onto the share of top speed still in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindDownCurve {
    Linear,
    /// Holds speed longest and brakes late.
    #[default]
    Accelerate,
    Decelerate,
}

impl WindDownCurve {
    #[inline(always)]
    pub fn ease(self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Accelerate => t * t,
            Self::Decelerate => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }

    /// 1.0 at the start of the wind-down, 0.0 at its end.
    #[inline(always)]
    pub fn top_speed_weight(self, progress: f32) -> f32 {
        1.0 - self.ease(progress)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "Linear",
            Self::Accelerate => "Accelerate",
            Self::Decelerate => "Decelerate",
        }
    }
}

impl FromStr for WindDownCurve {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "accelerate" => Ok(Self::Accelerate),
            "decelerate" => Ok(Self::Decelerate),
            _ => Err(()),
        }
    }
}

/// Fixed tunables. Distances are in reel units, times in seconds.
#[derive(Debug, Clone, Copy)]
pub struct SpinTuning {
    pub top_speed: f32,
    pub ramp_up_seconds: f32,
    pub wind_down_rotations: f32,
    /// Fraction of one rotation handled by the spring.
    pub final_approach_fraction: f32,
    pub final_approach_max_seconds: f32,
    pub extra_rotations_min: u32,
    /// Exclusive.
    pub extra_rotations_max: u32,
    pub approach_speed_min: f32,
    pub approach_speed_max: f32,
    pub spring_drag_min: f32,
    pub spring_drag_max: f32,
    pub spring_strength_scale: f32,
    pub settle_speed: f32,
    pub settle_distance: f32,
    pub settle_timeout_seconds: f32,
    pub curve: WindDownCurve,
}

impl Default for SpinTuning {
    fn default() -> Self {
        Self {
            top_speed: 15.0,
            ramp_up_seconds: 0.2,
            wind_down_rotations: 5.0,
            final_approach_fraction: 1.0 / 32.0,
            final_approach_max_seconds: 5.0,
            extra_rotations_min: 6,
            extra_rotations_max: 10,
            approach_speed_min: 0.15,
            approach_speed_max: 0.75,
            spring_drag_min: 2.0,
            spring_drag_max: 4.0,
            spring_strength_scale: 3.0,
            settle_speed: 0.15,
            settle_distance: 0.025,
            settle_timeout_seconds: 2.5,
            curve: WindDownCurve::Accelerate,
        }
    }
}

/// Per-spin randomized feel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinParams {
    pub spring_drag: f32,
    pub approach_speed: f32,
}

impl SpinParams {
    pub fn roll<R: Rng + ?Sized>(tuning: &SpinTuning, rng: &mut R) -> Self {
        Self {
            spring_drag: sample_range(rng, tuning.spring_drag_min, tuning.spring_drag_max),
            approach_speed: sample_range(
                rng,
                tuning.approach_speed_min,
                tuning.approach_speed_max,
            ),
        }
    }
}

#[inline(always)]
fn sample_range<R: Rng + ?Sized>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}

pub fn roll_extra_rotations<R: Rng + ?Sized>(tuning: &SpinTuning, rng: &mut R) -> u32 {
    if tuning.extra_rotations_max > tuning.extra_rotations_min {
        rng.random_range(tuning.extra_rotations_min..tuning.extra_rotations_max)
    } else {
        tuning.extra_rotations_min
    }
}

#[inline(always)]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (b - a).mul_add(t, a)
}

pub struct SpinSimulator {
    tuning: SpinTuning,
    full_rotation: f32,
    params: SpinParams,
    phase: SimulationPhase,
    settled: bool,
    current_distance: f32,
    goal_distance: f32,
    current_speed: f32,
    distance_this_frame: f32,
    completed_rotations: u32,
    /// Seconds since the current spin began.
    spin_time: f32,
    /// `spin_time` at which the final approach began.
    final_approach_started_at: f32,
}

impl SpinSimulator {
    pub fn new(tuning: SpinTuning, full_rotation: f32) -> Self {
        debug_assert!(full_rotation > 0.0);
        Self {
            tuning,
            full_rotation,
            params: SpinParams {
                spring_drag: tuning.spring_drag_min,
                approach_speed: tuning.approach_speed_min,
            },
            phase: SimulationPhase::Idle,
            settled: false,
            current_distance: 0.0,
            goal_distance: 0.0,
            current_speed: 0.0,
            distance_this_frame: 0.0,
            completed_rotations: 0,
            spin_time: 0.0,
            final_approach_started_at: 0.0,
        }
    }

    #[inline(always)]
    pub fn tuning(&self) -> &SpinTuning {
        &self.tuning
    }

    #[inline(always)]
    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    #[inline(always)]
    pub fn current_speed(&self) -> f32 {
        self.current_speed
    }

    #[inline(always)]
    pub fn distance_this_frame(&self) -> f32 {
        self.distance_this_frame
    }

    #[inline(always)]
    pub fn current_distance(&self) -> f32 {
        self.current_distance
    }

    #[inline(always)]
    pub fn goal_distance(&self) -> f32 {
        self.goal_distance
    }

    #[inline(always)]
    pub fn full_rotation_distance(&self) -> f32 {
        self.full_rotation
    }

    /// Degrees travelled since the simulator was created.
    pub fn total_rotation_so_far(&self) -> f32 {
        (self.current_distance / self.full_rotation + self.completed_rotations as f32) * 360.0
    }

    #[inline(always)]
    pub fn distance_from_target(&self) -> f32 {
        (self.goal_distance - self.current_distance).abs()
    }

    #[inline(always)]
    fn wind_down_range(&self) -> f32 {
        self.full_rotation * self.tuning.wind_down_rotations
    }

    #[inline(always)]
    fn final_approach_range(&self) -> f32 {
        self.full_rotation * self.tuning.final_approach_fraction
    }

    #[inline(always)]
    fn spring_strength(&self) -> f32 {
        self.tuning.spring_strength_scale * self.params.approach_speed
    }

    #[inline(always)]
    fn final_approach_seconds(&self) -> f32 {
        self.spin_time - self.final_approach_started_at
    }

    #[inline(always)]
    fn in_final_approach(&self) -> bool {
        matches!(
            self.phase,
            SimulationPhase::FinalApproach | SimulationPhase::Settled
        )
    }

    /// Starts a spin toward `target_distance`. Whole rotations already
    /// travelled are folded into the rotation counter first; the target is
    /// shifted along with the current distance so the remaining travel is
    /// unchanged.
    pub fn begin_spin(&mut self, target_distance: f32, params: SpinParams) {
        debug_assert!(
            matches!(self.phase, SimulationPhase::Idle | SimulationPhase::Settled),
            "begin_spin while a spin is still running"
        );

        let travel = target_distance - self.current_distance;
        while self.current_distance > self.full_rotation {
            self.current_distance -= self.full_rotation;
            self.completed_rotations += 1;
        }

        self.goal_distance = self.current_distance + travel;
        self.params = params;
        self.current_speed = 0.0;
        self.distance_this_frame = 0.0;
        self.spin_time = 0.0;
        self.final_approach_started_at = 0.0;
        self.settled = false;
        self.phase = SimulationPhase::RampUp;
        debug!(
            "Spin begins: travel {travel:.3}, drag {:.3}, approach speed {:.3}",
            params.spring_drag, params.approach_speed
        );
    }

    /// Advances one frame: integrate distance with last frame's speed, then
    /// derive the next speed and evaluate the settle latch.
    pub fn tick(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.distance_this_frame = self.current_speed * dt;
        self.current_distance += self.distance_this_frame;

        if self.phase == SimulationPhase::Idle {
            return;
        }
        self.spin_time += dt;

        self.update_speed(dt);
        if !self.settled && self.settle_predicate() {
            self.settled = true;
            self.phase = SimulationPhase::Settled;
            debug!(
                "Spin settled {:.4} from target after {:.2}s",
                self.distance_from_target(),
                self.spin_time
            );
        }
    }

    fn update_speed(&mut self, dt: f32) {
        let remaining = self.goal_distance - self.current_distance;
        let approach_range = self.final_approach_range();

        if remaining < approach_range || self.in_final_approach() {
            if !self.in_final_approach() {
                self.phase = SimulationPhase::FinalApproach;
                self.final_approach_started_at = self.spin_time;
            }
            self.current_speed += (remaining / approach_range) * self.spring_strength() * dt;
            self.current_speed *= 1.0 - dt * self.params.spring_drag;
        } else {
            let progress =
                1.0 - ((remaining - approach_range) / self.wind_down_range()).clamp(0.0, 1.0);
            let weight = self.tuning.curve.top_speed_weight(progress);
            self.current_speed = lerp(self.params.approach_speed, self.tuning.top_speed, weight);
        }

        let since_start = self.spin_time;
        let ramp = if self.tuning.ramp_up_seconds > 0.0 {
            (since_start / self.tuning.ramp_up_seconds).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.current_speed *= ramp;

        if self.in_final_approach() {
            // Residual spring drift never quite reaches zero on its own.
            if self.final_approach_seconds() > self.tuning.final_approach_max_seconds {
                self.current_speed = 0.0;
            }
        } else if since_start >= self.tuning.ramp_up_seconds {
            self.phase = SimulationPhase::Cruise;
        }
    }

    fn settle_predicate(&self) -> bool {
        self.in_final_approach()
            && self.current_speed.abs() < self.tuning.settle_speed
            && self.spin_time > self.tuning.ramp_up_seconds
            && (self.distance_from_target() < self.tuning.settle_distance
                || self.final_approach_seconds() > self.tuning.settle_timeout_seconds)
    }

    /// Latched once the settle predicate fires; cleared by `begin_spin`.
    #[inline(always)]
    pub fn is_settled(&self) -> bool {
        self.settled
    }
}

#[cfg(test)]
mod tests {
    use super::{SimulationPhase, SpinParams, SpinSimulator, SpinTuning, WindDownCurve};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const DT: f32 = 1.0 / 60.0;
    const ROTATION: f32 = 16.0;
    const MAX_FRAMES: usize = 60 * 180;

    fn run_to_settle(sim: &mut SpinSimulator) -> usize {
        for frame in 0..MAX_FRAMES {
            sim.tick(DT);
            if sim.is_settled() {
                return frame;
            }
        }
        panic!(
            "spin never settled; phase={:?} distance={} goal={} speed={}",
            sim.phase(),
            sim.current_distance(),
            sim.goal_distance(),
            sim.current_speed()
        );
    }

    #[test]
    fn settles_on_target_for_parameter_extremes() {
        let tuning = SpinTuning::default();
        let drags = [tuning.spring_drag_min, tuning.spring_drag_max];
        let speeds = [tuning.approach_speed_min, tuning.approach_speed_max];
        for &spring_drag in &drags {
            for &approach_speed in &speeds {
                for rotations in [6.0_f32, 9.0] {
                    let mut sim = SpinSimulator::new(tuning, ROTATION);
                    let target = 7.25 + ROTATION * rotations;
                    sim.begin_spin(target, SpinParams { spring_drag, approach_speed });
                    run_to_settle(&mut sim);

                    let err = (sim.current_distance() - target).abs();
                    let spring_range = ROTATION * tuning.final_approach_fraction;
                    assert!(
                        err < spring_range,
                        "drag={spring_drag} approach={approach_speed}: settled {err} from target"
                    );
                    assert_eq!(sim.phase(), SimulationPhase::Settled);
                }
            }
        }
    }

    #[test]
    fn random_spins_settle_within_threshold_or_timeout() {
        let tuning = SpinTuning::default();
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..20 {
            let mut sim = SpinSimulator::new(tuning, ROTATION);
            let params = SpinParams::roll(&tuning, &mut rng);
            assert!((tuning.spring_drag_min..tuning.spring_drag_max).contains(&params.spring_drag));
            assert!(
                (tuning.approach_speed_min..tuning.approach_speed_max)
                    .contains(&params.approach_speed)
            );
            let extra = super::roll_extra_rotations(&tuning, &mut rng);
            assert!((tuning.extra_rotations_min..tuning.extra_rotations_max).contains(&extra));

            let target = 3.0 + ROTATION * extra as f32;
            sim.begin_spin(target, params);
            run_to_settle(&mut sim);

            let close = sim.distance_from_target() < tuning.settle_distance;
            let timed_out = sim.final_approach_seconds() > tuning.settle_timeout_seconds;
            assert!(close || timed_out, "settled without meeting either condition");
            assert!(sim.current_speed().abs() < tuning.settle_speed);
        }
    }

    #[test]
    fn settled_is_sticky_until_next_spin() {
        let tuning = SpinTuning::default();
        let mut sim = SpinSimulator::new(tuning, ROTATION);
        let params = SpinParams { spring_drag: 3.0, approach_speed: 0.5 };
        sim.begin_spin(ROTATION * 6.0 + 1.0, params);
        run_to_settle(&mut sim);

        for _ in 0..600 {
            sim.tick(DT);
            assert!(sim.is_settled());
        }

        sim.begin_spin(sim.current_distance() + ROTATION * 6.0, params);
        assert!(!sim.is_settled());
        assert_eq!(sim.phase(), SimulationPhase::RampUp);
    }

    #[test]
    fn phases_move_forward() {
        let tuning = SpinTuning::default();
        let mut sim = SpinSimulator::new(tuning, ROTATION);
        assert_eq!(sim.phase(), SimulationPhase::Idle);
        sim.tick(DT);
        assert_eq!(sim.current_distance(), 0.0, "idle reel must not move");

        sim.begin_spin(ROTATION * 8.0, SpinParams { spring_drag: 2.5, approach_speed: 0.3 });
        let mut last = SimulationPhase::RampUp;
        let order = |p: SimulationPhase| match p {
            SimulationPhase::Idle => 0,
            SimulationPhase::RampUp => 1,
            SimulationPhase::Cruise => 2,
            SimulationPhase::FinalApproach => 3,
            SimulationPhase::Settled => 4,
        };
        let mut saw_cruise = false;
        while !sim.is_settled() {
            sim.tick(DT);
            assert!(order(sim.phase()) >= order(last), "{last:?} -> {:?}", sim.phase());
            saw_cruise |= sim.phase() == SimulationPhase::Cruise;
            last = sim.phase();
        }
        assert!(saw_cruise);
    }

    #[test]
    fn ramp_up_eases_in_from_rest() {
        let tuning = SpinTuning::default();
        let mut sim = SpinSimulator::new(tuning, ROTATION);
        sim.begin_spin(ROTATION * 10.0, SpinParams { spring_drag: 3.0, approach_speed: 0.5 });
        sim.tick(DT);
        let first = sim.current_speed();
        assert!(first > 0.0 && first < tuning.top_speed * 0.2, "first frame speed {first}");
        for _ in 0..30 {
            sim.tick(DT);
        }
        assert!((sim.current_speed() - tuning.top_speed).abs() < 0.5);
    }

    #[test]
    fn rotation_counter_is_continuous_across_spins() {
        let tuning = SpinTuning::default();
        let mut sim = SpinSimulator::new(tuning, ROTATION);
        let params = SpinParams { spring_drag: 3.0, approach_speed: 0.6 };
        sim.begin_spin(ROTATION * 6.5, params);
        run_to_settle(&mut sim);
        let before = sim.total_rotation_so_far();

        let travel = ROTATION * 7.0;
        sim.begin_spin(sim.current_distance() + travel, params);
        assert!(sim.current_distance() <= ROTATION);
        assert!((sim.total_rotation_so_far() - before).abs() < 1e-2);
        assert!((sim.goal_distance() - sim.current_distance() - travel).abs() < 1e-3);
    }

    #[test]
    fn final_approach_is_cut_off_after_max_seconds() {
        let tuning = SpinTuning::default();
        let mut sim = SpinSimulator::new(tuning, ROTATION);
        sim.begin_spin(
            ROTATION * 6.0 + 2.0,
            SpinParams { spring_drag: tuning.spring_drag_min, approach_speed: tuning.approach_speed_max },
        );
        let mut frames = 0;
        while !matches!(sim.phase(), SimulationPhase::FinalApproach | SimulationPhase::Settled) {
            sim.tick(DT);
            frames += 1;
            assert!(frames < MAX_FRAMES, "never reached the final approach");
        }

        let cutoff_frames = (tuning.final_approach_max_seconds / DT).ceil() as usize + 2;
        for _ in 0..cutoff_frames {
            sim.tick(DT);
        }
        assert!(sim.final_approach_seconds() > tuning.final_approach_max_seconds);
        assert_eq!(sim.current_speed(), 0.0);

        let resting = sim.current_distance();
        for _ in 0..120 {
            sim.tick(DT);
            assert_eq!(sim.current_speed(), 0.0);
            assert_eq!(sim.current_distance(), resting);
            assert_eq!(sim.distance_this_frame(), 0.0);
        }
        assert!(sim.is_settled());
    }

    #[test]
    fn spin_clock_restarts_with_each_spin() {
        let tuning = SpinTuning::default();
        let mut sim = SpinSimulator::new(tuning, ROTATION);
        let params = SpinParams { spring_drag: 3.0, approach_speed: 0.5 };
        sim.begin_spin(ROTATION * 6.0, params);
        run_to_settle(&mut sim);
        for _ in 0..600 {
            sim.tick(DT);
        }
        assert!(sim.spin_time > 10.0);

        sim.begin_spin(sim.current_distance() + ROTATION * 6.0, params);
        assert_eq!(sim.spin_time, 0.0);
        sim.tick(DT);
        assert!(sim.current_speed() < tuning.top_speed * 0.2, "ramp-up must restart");
    }

    #[test]
    fn wind_down_curves_are_monotone() {
        for curve in [WindDownCurve::Linear, WindDownCurve::Accelerate, WindDownCurve::Decelerate] {
            assert_eq!(curve.top_speed_weight(0.0), 1.0);
            assert_eq!(curve.top_speed_weight(1.0), 0.0);
            let mut prev = 1.0;
            for i in 1..=20 {
                let w = curve.top_speed_weight(i as f32 / 20.0);
                assert!(w <= prev, "{curve:?} not monotone");
                prev = w;
            }
        }
    }
}
