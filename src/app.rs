use crate::config::{self, Config, PrinterKind};
use crate::core::input::{self, InputEvent};
use crate::game::catalog::Catalog;
use crate::receipt::{LogPrinter, ReceiptPrinter, SpoolPrinter};
use crate::screens::wheel::{self, FlowPhase};
use crate::screens::ScreenAction;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub struct App {
    wheel: wheel::State,
    printer: Box<dyn ReceiptPrinter>,
    frame_dt: f32,
    real_time: bool,
    last_phase: FlowPhase,
    total_elapsed: f32,
    last_trace_at: f32,
}

const SPIN_TRACE_INTERVAL: f32 = 1.0;

fn seed_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}

fn make_printer(cfg: &Config) -> Box<dyn ReceiptPrinter> {
    match cfg.printer {
        PrinterKind::Log => Box::new(LogPrinter),
        PrinterKind::Spool => Box::new(SpoolPrinter::new(
            cfg.spool_path.clone(),
            cfg.print_command.clone(),
        )),
    }
}

impl App {
    fn new(cfg: &Config, catalog: Arc<Catalog>) -> Self {
        let seed = cfg.seed.unwrap_or_else(seed_from_clock);
        info!("Random seed: {seed}");
        let wheel = wheel::init(
            catalog,
            cfg.spin_tuning(),
            cfg.reel_geometry(),
            cfg.flow_settings(),
            StdRng::seed_from_u64(seed),
        );
        Self {
            last_phase: wheel.phase(),
            wheel,
            printer: make_printer(cfg),
            frame_dt: cfg.frame_seconds(),
            real_time: cfg.real_time,
            total_elapsed: 0.0,
            last_trace_at: 0.0,
        }
    }

    /// Runs one fixed-length frame and reports phase changes.
    fn step_frame(&mut self) -> Option<ScreenAction> {
        self.total_elapsed += self.frame_dt;
        let action = wheel::update(&mut self.wheel, self.frame_dt);
        self.report_phase_change();
        if self.wheel.phase() == FlowPhase::Spinning
            && self.total_elapsed - self.last_trace_at >= SPIN_TRACE_INTERVAL
        {
            self.last_trace_at = self.total_elapsed;
            let sim = self.wheel.simulator();
            debug!(
                "{:?}: speed {:.2} ({:.2} rotations/s), {:.0} deg total, {:.2} to go",
                sim.phase(),
                sim.current_speed(),
                sim.current_speed() / sim.full_rotation_distance(),
                sim.total_rotation_so_far(),
                sim.goal_distance() - sim.current_distance()
            );
        }
        action
    }

    fn route_input_event(&mut self, ev: InputEvent) -> bool {
        let action = wheel::handle_input(&mut self.wheel, &ev);
        self.report_phase_change();
        self.handle_action(action)
    }

    /// Returns `false` when the app should exit.
    fn handle_action(&mut self, action: ScreenAction) -> bool {
        match action {
            ScreenAction::None => true,
            ScreenAction::PrintReceipt(receipt) => {
                self.printer.print(&receipt);
                true
            }
            ScreenAction::Exit => false,
        }
    }

    fn report_phase_change(&mut self) {
        let phase = self.wheel.phase();
        if phase == self.last_phase {
            return;
        }
        info!(
            "{} -> {} at {:.2}s",
            self.last_phase.as_str(),
            phase.as_str(),
            self.total_elapsed
        );
        if phase == FlowPhase::DisplayingResults {
            self.print_reveal_window();
            if let Some(activity) = self.wheel.current_activity() {
                println!("{} ({})", activity.name, activity.players.summary());
            }
        }
        self.last_phase = phase;
    }

    /// Rows around the reveal row as they sit after the reel stops.
    fn print_reveal_window(&self) {
        let reel = self.wheel.reel();
        let geometry = reel.geometry();
        let reveal = geometry.reveal_offset();
        let Some((reveal_y, _)) = reel.slot_nearest(reveal) else {
            return;
        };
        let target = reel.target_slot_nearest(reveal).map(|(_, slot)| slot.id);
        for (y, slot) in reel.iter().collect::<Vec<_>>().into_iter().rev() {
            if (y - reveal_y).abs() > geometry.slot_height * 2.5 {
                continue;
            }
            let marker = if Some(slot.id) == target { ">>>" } else { "   " };
            let stripe = if slot.is_odd { ':' } else { '.' };
            println!("{marker} {stripe} {}", slot.label);
        }
    }

    fn prompt(&self) {
        match self.wheel.phase() {
            FlowPhase::ReadyToSpin => print!(
                "[{} player(s)] {}> ",
                self.wheel.player_count(),
                input::console_help()
            ),
            FlowPhase::DisplayingResults => print!("accept or decline> "),
            FlowPhase::Spinning => return,
        }
        let _ = std::io::stdout().flush();
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cfg = config::get();
    let catalog = Arc::new(Catalog::load(&cfg.catalog_path)?);
    let mut app = App::new(&cfg, catalog);

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if app.wheel.awaiting_input() {
            app.prompt();
            let Some(line) = lines.next() else {
                info!("Input closed; exiting.");
                break;
            };
            let line = line?;
            match input::map_console_line(&line) {
                Some(ev) => {
                    if !app.route_input_event(ev) {
                        break;
                    }
                }
                None => warn!("Unknown command '{}'.", line.trim()),
            }
            continue;
        }

        if let Some(action) = app.step_frame()
            && !app.handle_action(action)
        {
            break;
        }
        if app.real_time {
            std::thread::sleep(Duration::from_secs_f32(app.frame_dt));
        }
    }
    Ok(())
}
