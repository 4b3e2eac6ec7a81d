use crate::core::input::{InputEvent, VirtualAction};
use crate::game::activity::{Activity, ActivityId};
use crate::game::catalog::{Catalog, SUPPORTED_PLAYER_COUNTS};
use crate::game::reel::{ReelGeometry, SegmentReel};
use crate::game::selector::{ActivitySelector, SelectionPools};
use crate::game::spin::{SpinParams, SpinSimulator, SpinTuning, roll_extra_rotations};
use crate::receipt::ReceiptData;
use crate::screens::ScreenAction;
use chrono::NaiveTime;
use log::{error, info};
use rand::RngExt;
use rand::rngs::StdRng;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSettings {
    pub initial_player_count: u8,
    pub reroll_min: u8,
    /// Inclusive.
    pub reroll_max: u8,
    pub reveal_delay_seconds: f32,
    /// Fixed clock for availability windows; `None` reads the local time.
    pub time_of_day: Option<NaiveTime>,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            initial_player_count: 3,
            reroll_min: 2,
            reroll_max: 6,
            reveal_delay_seconds: 1.0,
            time_of_day: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    ReadyToSpin,
    Spinning,
    DisplayingResults,
}

impl FlowPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadyToSpin => "ReadyToSpin",
            Self::Spinning => "Spinning",
            Self::DisplayingResults => "DisplayingResults",
        }
    }
}

pub struct State {
    phase: FlowPhase,
    player_count: u8,
    settings: FlowSettings,
    selector: ActivitySelector,
    pools: SelectionPools,
    sim: SpinSimulator,
    reel: SegmentReel,
    rng: StdRng,
    current_target: Option<ActivityId>,
    result_elapsed: f32,
}

impl State {
    #[inline(always)]
    pub fn phase(&self) -> FlowPhase {
        self.phase
    }

    #[inline(always)]
    pub fn player_count(&self) -> u8 {
        self.player_count
    }

    #[cfg(test)]
    #[inline(always)]
    pub fn current_target(&self) -> Option<ActivityId> {
        self.current_target
    }

    pub fn current_activity(&self) -> Option<&Activity> {
        self.current_target.and_then(|id| self.catalog().get(id))
    }

    #[cfg(test)]
    #[inline(always)]
    pub fn pools(&self) -> &SelectionPools {
        &self.pools
    }

    #[inline(always)]
    pub fn reel(&self) -> &SegmentReel {
        &self.reel
    }

    #[inline(always)]
    pub fn simulator(&self) -> &SpinSimulator {
        &self.sim
    }

    #[inline(always)]
    pub fn catalog(&self) -> &Catalog {
        self.selector.catalog()
    }

    /// The result is on screen and the reveal delay has run out.
    #[inline(always)]
    pub fn is_revealed(&self) -> bool {
        self.phase == FlowPhase::DisplayingResults
            && self.result_elapsed >= self.settings.reveal_delay_seconds
    }

    /// True while nothing moves until the next input arrives.
    pub fn awaiting_input(&self) -> bool {
        match self.phase {
            FlowPhase::ReadyToSpin => true,
            FlowPhase::Spinning => false,
            FlowPhase::DisplayingResults => self.is_revealed(),
        }
    }

    fn now(&self) -> NaiveTime {
        self.settings
            .time_of_day
            .unwrap_or_else(|| chrono::Local::now().time())
    }

    fn label_of(&self, id: ActivityId) -> String {
        self.catalog().get(id).map_or_else(String::new, Activity::label)
    }
}

pub fn init(
    catalog: Arc<Catalog>,
    tuning: SpinTuning,
    geometry: ReelGeometry,
    settings: FlowSettings,
    rng: StdRng,
) -> State {
    let mut state = State {
        phase: FlowPhase::ReadyToSpin,
        player_count: clamp_player_count(settings.initial_player_count),
        settings,
        selector: ActivitySelector::new(catalog),
        pools: SelectionPools::new(),
        sim: SpinSimulator::new(tuning, geometry.full_rotation()),
        reel: SegmentReel::new(geometry),
        rng,
        current_target: None,
        result_elapsed: 0.0,
    };
    dress_idle_reel(&mut state);
    info!("Ready to spin for {} player(s).", state.player_count);
    state
}

#[inline(always)]
fn clamp_player_count(n: u8) -> u8 {
    n.clamp(*SUPPORTED_PLAYER_COUNTS.start(), *SUPPORTED_PLAYER_COUNTS.end())
}

fn dress_idle_reel(state: &mut State) {
    let geometry = *state.reel.geometry();
    let now = state.now();
    match state.selector.plan_idle(
        state.player_count,
        &state.pools,
        now,
        geometry.slot_count,
        &mut state.rng,
    ) {
        Ok(plan) => {
            let labels: Vec<String> = plan.items.iter().map(|&id| state.label_of(id)).collect();
            state.reel.populate_decoys(&labels);
        }
        Err(e) => error!("Could not dress the idle reel: {e}"),
    }
}

/// Select, populate and launch. Leaves the flow in `ReadyToSpin` if no
/// target can be chosen.
fn start_spin(state: &mut State) {
    let geometry = *state.reel.geometry();
    let now = state.now();
    let plan = match state.selector.plan_spin(
        state.player_count,
        &state.pools,
        now,
        geometry.slot_count,
        geometry.target_index(),
        &mut state.rng,
    ) {
        Ok(plan) => plan,
        Err(e) => {
            error!("Cannot spin for {} player(s): {e}", state.player_count);
            state.phase = FlowPhase::ReadyToSpin;
            return;
        }
    };
    let Some(target) = plan.target() else {
        error!("Spin plan carried no target.");
        state.phase = FlowPhase::ReadyToSpin;
        return;
    };

    let labels: Vec<String> = plan.items.iter().map(|&id| state.label_of(id)).collect();
    let target_index = plan.target_index.unwrap_or(geometry.target_index());
    let target_y = state.reel.populate(&labels, target_index);

    let tuning = *state.sim.tuning();
    let extra = roll_extra_rotations(&tuning, &mut state.rng);
    let goal = state.sim.current_distance()
        + (target_y - geometry.reveal_offset())
        + geometry.full_rotation() * extra as f32;
    let params = SpinParams::roll(&tuning, &mut state.rng);
    state.sim.begin_spin(goal, params);

    state.current_target = Some(target);
    state.result_elapsed = 0.0;
    state.phase = FlowPhase::Spinning;
    info!(
        "Spinning for {} player(s), {extra} extra rotation(s); target '{}'.",
        state.player_count,
        state.label_of(target)
    );
}

pub fn update(state: &mut State, dt: f32) -> Option<ScreenAction> {
    state.sim.tick(dt);
    state.reel.advance(state.sim.distance_this_frame());

    match state.phase {
        FlowPhase::Spinning if state.sim.is_settled() => {
            state.phase = FlowPhase::DisplayingResults;
            state.result_elapsed = 0.0;
            if let Some(activity) = state.current_activity() {
                info!("Landed on '{}'.", activity.name);
            }
        }
        FlowPhase::DisplayingResults => state.result_elapsed += dt,
        _ => {}
    }
    None
}

pub fn handle_input(state: &mut State, ev: &InputEvent) -> ScreenAction {
    if !ev.pressed {
        return ScreenAction::None;
    }

    match (state.phase, ev.action) {
        (_, VirtualAction::exit) => ScreenAction::Exit,
        (FlowPhase::ReadyToSpin, VirtualAction::count_up) => {
            let n = state.player_count.saturating_add(1);
            set_player_count(state, n);
            ScreenAction::None
        }
        (FlowPhase::ReadyToSpin, VirtualAction::count_down) => {
            let n = state.player_count.saturating_sub(1);
            set_player_count(state, n);
            ScreenAction::None
        }
        (FlowPhase::ReadyToSpin, VirtualAction::start) => {
            start_spin(state);
            ScreenAction::None
        }
        (FlowPhase::DisplayingResults, VirtualAction::accept) if state.is_revealed() => {
            accept_result(state)
        }
        (FlowPhase::DisplayingResults, VirtualAction::decline) if state.is_revealed() => {
            decline_result(state);
            ScreenAction::None
        }
        _ => ScreenAction::None,
    }
}

fn set_player_count(state: &mut State, n: u8) {
    let n = clamp_player_count(n);
    if n != state.player_count {
        state.player_count = n;
        info!("Player count set to {n}.");
    }
}

fn accept_result(state: &mut State) -> ScreenAction {
    let Some(id) = state.current_target.take() else {
        state.phase = FlowPhase::ReadyToSpin;
        return ScreenAction::None;
    };
    state.pools.on_accepted(id);
    let receipt = state.catalog().get(id).map(ReceiptData::from_activity);

    let (lo, hi) = if state.settings.reroll_min <= state.settings.reroll_max {
        (state.settings.reroll_min, state.settings.reroll_max)
    } else {
        (state.settings.reroll_max, state.settings.reroll_min)
    };
    state.player_count = clamp_player_count(state.rng.random_range(lo..=hi));
    state.phase = FlowPhase::ReadyToSpin;
    info!(
        "Accepted '{}' ({} resolved). Ready to spin for {} player(s).",
        state.label_of(id),
        state.pools.resolved_len(),
        state.player_count
    );

    receipt.map_or(ScreenAction::None, ScreenAction::PrintReceipt)
}

fn decline_result(state: &mut State) {
    let Some(id) = state.current_target.take() else {
        state.phase = FlowPhase::ReadyToSpin;
        return;
    };
    state.pools.on_declined(id);
    info!("Declined '{}'; spinning again.", state.label_of(id));
    state.phase = FlowPhase::ReadyToSpin;
    start_spin(state);
}
