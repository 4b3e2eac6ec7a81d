use crate::game::catalog::SUPPORTED_PLAYER_COUNTS;
use crate::game::reel::ReelGeometry;
use crate::game::spin::{SpinTuning, WindDownCurve};
use crate::screens::wheel::FlowSettings;
use chrono::NaiveTime;
use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

const CONFIG_PATH: &str = "activity-wheel.ini";

// --- Minimal INI reader ---
#[derive(Debug, Default)]
pub struct SimpleIni {
    sections: HashMap<String, HashMap<String, String>>,
}

impl SimpleIni {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        self.parse(&content);
        Ok(())
    }

    pub fn parse(&mut self, content: &str) {
        self.sections.clear();
        let mut current_section = String::new();

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            // [Section]
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current_section = name.trim().to_string();
                self.sections.entry(current_section.clone()).or_default();
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                self.sections
                    .entry(current_section.clone())
                    .or_default()
                    .insert(key.to_string(), value.trim().to_string());
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section).and_then(|s| s.get(key)).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterKind {
    Log,
    Spool,
}

impl PrinterKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Log => "Log",
            Self::Spool => "Spool",
        }
    }
}

impl FromStr for PrinterKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "spool" => Ok(Self::Spool),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    pub catalog_path: String,
    /// `None` seeds from the system clock.
    pub seed: Option<u64>,
    pub frame_rate: u32,
    /// Sleep between frames so spins play out at wall-clock speed.
    pub real_time: bool,
    pub time_of_day: Option<NaiveTime>,

    // [Wheel]
    pub slot_count: usize,
    pub slot_height: f32,
    pub top_speed: f32,
    pub ramp_up_seconds: f32,
    pub wind_down_rotations: f32,
    pub final_approach_fraction: f32,
    pub final_approach_max_seconds: f32,
    pub extra_rotations_min: u32,
    pub extra_rotations_max: u32,
    pub approach_speed_min: f32,
    pub approach_speed_max: f32,
    pub spring_drag_min: f32,
    pub spring_drag_max: f32,
    pub spring_strength_scale: f32,
    pub settle_speed: f32,
    pub settle_distance: f32,
    pub settle_timeout_seconds: f32,
    pub wind_down_curve: WindDownCurve,
    pub reveal_delay_seconds: f32,

    // [Game]
    pub initial_player_count: u8,
    pub reroll_player_count_min: u8,
    pub reroll_player_count_max: u8,

    // [Receipt]
    pub printer: PrinterKind,
    pub spool_path: String,
    pub print_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let tuning = SpinTuning::default();
        let geometry = ReelGeometry::default();
        let flow = FlowSettings::default();
        Self {
            log_level: LogLevel::Info,
            catalog_path: "assets/activities.json".to_string(),
            seed: None,
            frame_rate: 60,
            real_time: true,
            time_of_day: None,
            slot_count: geometry.slot_count,
            slot_height: geometry.slot_height,
            top_speed: tuning.top_speed,
            ramp_up_seconds: tuning.ramp_up_seconds,
            wind_down_rotations: tuning.wind_down_rotations,
            final_approach_fraction: tuning.final_approach_fraction,
            final_approach_max_seconds: tuning.final_approach_max_seconds,
            extra_rotations_min: tuning.extra_rotations_min,
            extra_rotations_max: tuning.extra_rotations_max,
            approach_speed_min: tuning.approach_speed_min,
            approach_speed_max: tuning.approach_speed_max,
            spring_drag_min: tuning.spring_drag_min,
            spring_drag_max: tuning.spring_drag_max,
            spring_strength_scale: tuning.spring_strength_scale,
            settle_speed: tuning.settle_speed,
            settle_distance: tuning.settle_distance,
            settle_timeout_seconds: tuning.settle_timeout_seconds,
            wind_down_curve: tuning.curve,
            reveal_delay_seconds: flow.reveal_delay_seconds,
            initial_player_count: flow.initial_player_count,
            reroll_player_count_min: flow.reroll_min,
            reroll_player_count_max: flow.reroll_max,
            printer: PrinterKind::Log,
            spool_path: "receipt/receiptContents.json".to_string(),
            print_command: None,
        }
    }
}

impl Config {
    pub fn spin_tuning(&self) -> SpinTuning {
        SpinTuning {
            top_speed: self.top_speed,
            ramp_up_seconds: self.ramp_up_seconds,
            wind_down_rotations: self.wind_down_rotations,
            final_approach_fraction: self.final_approach_fraction,
            final_approach_max_seconds: self.final_approach_max_seconds,
            extra_rotations_min: self.extra_rotations_min,
            extra_rotations_max: self.extra_rotations_max,
            approach_speed_min: self.approach_speed_min,
            approach_speed_max: self.approach_speed_max,
            spring_drag_min: self.spring_drag_min,
            spring_drag_max: self.spring_drag_max,
            spring_strength_scale: self.spring_strength_scale,
            settle_speed: self.settle_speed,
            settle_distance: self.settle_distance,
            settle_timeout_seconds: self.settle_timeout_seconds,
            curve: self.wind_down_curve,
        }
    }

    pub const fn reel_geometry(&self) -> ReelGeometry {
        ReelGeometry {
            slot_height: self.slot_height,
            slot_count: self.slot_count,
        }
    }

    pub const fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            initial_player_count: self.initial_player_count,
            reroll_min: self.reroll_player_count_min,
            reroll_max: self.reroll_player_count_max,
            reveal_delay_seconds: self.reveal_delay_seconds,
            time_of_day: self.time_of_day,
        }
    }

    #[inline(always)]
    pub fn frame_seconds(&self) -> f32 {
        1.0 / self.frame_rate as f32
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- Parsing helpers ---

#[inline(always)]
fn parse_flag(v: &str) -> Option<bool> {
    let v = v.trim();
    if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("on") {
        Some(true)
    } else if v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("off") {
        Some(false)
    } else {
        v.parse::<u8>().ok().map(|n| n != 0)
    }
}

#[inline(always)]
fn parse_auto<T: FromStr>(v: &str) -> Option<Option<T>> {
    let v = v.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("auto") {
        Some(None)
    } else {
        v.parse::<T>().ok().map(Some)
    }
}

#[inline(always)]
fn parse_clock(v: &str) -> Option<Option<NaiveTime>> {
    let v = v.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("auto") {
        Some(None)
    } else {
        NaiveTime::parse_from_str(v, "%H:%M").ok().map(Some)
    }
}

/// Orders a (min, max) pair; a reversed range is swapped rather than rejected.
fn ordered<T: PartialOrd + std::fmt::Display + Copy>(name: &str, lo: T, hi: T) -> (T, T) {
    if lo > hi {
        warn!("{name}: minimum {lo} exceeds maximum {hi}; swapping.");
        (hi, lo)
    } else {
        (lo, hi)
    }
}

fn positive(name: &str, value: f32, default: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!("{name}={value} must be positive; using {default}.");
        default
    }
}

fn clamp_players(n: u8) -> u8 {
    n.clamp(*SUPPORTED_PLAYER_COUNTS.start(), *SUPPORTED_PLAYER_COUNTS.end())
}

/// Builds a config from parsed INI data. Missing or malformed keys keep
/// their defaults.
pub fn from_ini(conf: &SimpleIni) -> Config {
    let default = Config::default();
    let f32_key = |section: &str, key: &str, fallback: f32| {
        conf.get(section, key)
            .and_then(|v| v.trim().parse::<f32>().ok())
            .unwrap_or(fallback)
    };

    let mut cfg = default.clone();

    // [Options]
    cfg.log_level = conf
        .get("Options", "LogLevel")
        .and_then(|v| LogLevel::from_str(&v).ok())
        .unwrap_or(default.log_level);
    cfg.catalog_path = conf
        .get("Options", "CatalogPath")
        .filter(|v| !v.is_empty())
        .unwrap_or(default.catalog_path.clone());
    cfg.seed = conf
        .get("Options", "Seed")
        .and_then(|v| parse_auto::<u64>(&v))
        .unwrap_or(default.seed);
    cfg.frame_rate = conf
        .get("Options", "FrameRate")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .map(|v| v.clamp(1, 1000))
        .unwrap_or(default.frame_rate);
    cfg.real_time = conf
        .get("Options", "RealTime")
        .and_then(|v| parse_flag(&v))
        .unwrap_or(default.real_time);
    cfg.time_of_day = conf
        .get("Options", "TimeOfDay")
        .and_then(|v| parse_clock(&v))
        .unwrap_or(default.time_of_day);

    // [Wheel]
    cfg.slot_count = conf
        .get("Wheel", "SlotCount")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .map(|v| v.max(2))
        .unwrap_or(default.slot_count);
    cfg.slot_height = positive(
        "SlotHeight",
        f32_key("Wheel", "SlotHeight", default.slot_height),
        default.slot_height,
    );
    cfg.top_speed = positive(
        "TopSpeed",
        f32_key("Wheel", "TopSpeed", default.top_speed),
        default.top_speed,
    );
    cfg.ramp_up_seconds = f32_key("Wheel", "RampUpSeconds", default.ramp_up_seconds).max(0.0);
    cfg.wind_down_rotations = positive(
        "WindDownRotations",
        f32_key("Wheel", "WindDownRotations", default.wind_down_rotations),
        default.wind_down_rotations,
    );
    cfg.final_approach_fraction = positive(
        "FinalApproachFraction",
        f32_key("Wheel", "FinalApproachFraction", default.final_approach_fraction),
        default.final_approach_fraction,
    );
    cfg.final_approach_max_seconds = positive(
        "FinalApproachMaxSeconds",
        f32_key("Wheel", "FinalApproachMaxSeconds", default.final_approach_max_seconds),
        default.final_approach_max_seconds,
    );
    let extra_min = conf
        .get("Wheel", "ExtraRotationsMin")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default.extra_rotations_min);
    let extra_max = conf
        .get("Wheel", "ExtraRotationsMax")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default.extra_rotations_max);
    (cfg.extra_rotations_min, cfg.extra_rotations_max) =
        ordered("ExtraRotations", extra_min, extra_max);
    (cfg.approach_speed_min, cfg.approach_speed_max) = ordered(
        "ApproachSpeed",
        positive(
            "ApproachSpeedMin",
            f32_key("Wheel", "ApproachSpeedMin", default.approach_speed_min),
            default.approach_speed_min,
        ),
        positive(
            "ApproachSpeedMax",
            f32_key("Wheel", "ApproachSpeedMax", default.approach_speed_max),
            default.approach_speed_max,
        ),
    );
    (cfg.spring_drag_min, cfg.spring_drag_max) = ordered(
        "SpringDrag",
        positive(
            "SpringDragMin",
            f32_key("Wheel", "SpringDragMin", default.spring_drag_min),
            default.spring_drag_min,
        ),
        positive(
            "SpringDragMax",
            f32_key("Wheel", "SpringDragMax", default.spring_drag_max),
            default.spring_drag_max,
        ),
    );
    cfg.spring_strength_scale = positive(
        "SpringStrengthScale",
        f32_key("Wheel", "SpringStrengthScale", default.spring_strength_scale),
        default.spring_strength_scale,
    );
    cfg.settle_speed = positive(
        "SettleSpeed",
        f32_key("Wheel", "SettleSpeed", default.settle_speed),
        default.settle_speed,
    );
    cfg.settle_distance = positive(
        "SettleDistance",
        f32_key("Wheel", "SettleDistance", default.settle_distance),
        default.settle_distance,
    );
    cfg.settle_timeout_seconds = positive(
        "SettleTimeoutSeconds",
        f32_key("Wheel", "SettleTimeoutSeconds", default.settle_timeout_seconds),
        default.settle_timeout_seconds,
    );
    cfg.wind_down_curve = conf
        .get("Wheel", "WindDownCurve")
        .and_then(|v| WindDownCurve::from_str(&v).ok())
        .unwrap_or(default.wind_down_curve);
    cfg.reveal_delay_seconds =
        f32_key("Wheel", "RevealDelaySeconds", default.reveal_delay_seconds).max(0.0);

    // [Game]
    let player_key = |key: &str, fallback: u8| {
        conf.get("Game", key)
            .and_then(|v| v.trim().parse::<u8>().ok())
            .map_or(fallback, clamp_players)
    };
    cfg.initial_player_count = player_key("InitialPlayerCount", default.initial_player_count);
    (cfg.reroll_player_count_min, cfg.reroll_player_count_max) = ordered(
        "RerollPlayerCount",
        player_key("RerollPlayerCountMin", default.reroll_player_count_min),
        player_key("RerollPlayerCountMax", default.reroll_player_count_max),
    );

    // [Receipt]
    cfg.printer = conf
        .get("Receipt", "Printer")
        .and_then(|v| PrinterKind::from_str(&v).ok())
        .unwrap_or(default.printer);
    cfg.spool_path = conf
        .get("Receipt", "SpoolPath")
        .filter(|v| !v.is_empty())
        .unwrap_or(default.spool_path);
    cfg.print_command = conf
        .get("Receipt", "Command")
        .filter(|v| !v.is_empty())
        .or(default.print_command);

    cfg
}

fn render_ini(cfg: &Config) -> String {
    let flag = |b: bool| if b { "1" } else { "0" };
    let mut content = String::new();

    content.push_str("[Options]\n");
    content.push_str(&format!("CatalogPath={}\n", cfg.catalog_path));
    content.push_str(&format!("FrameRate={}\n", cfg.frame_rate));
    content.push_str(&format!("LogLevel={}\n", cfg.log_level.as_str()));
    content.push_str(&format!("RealTime={}\n", flag(cfg.real_time)));
    content.push_str(&format!(
        "Seed={}\n",
        cfg.seed.map_or_else(|| "Auto".to_string(), |s| s.to_string())
    ));
    content.push_str(&format!(
        "TimeOfDay={}\n",
        cfg.time_of_day
            .map_or_else(|| "Auto".to_string(), |t| t.format("%H:%M").to_string())
    ));
    content.push('\n');

    content.push_str("[Wheel]\n");
    content.push_str(&format!("ApproachSpeedMax={}\n", cfg.approach_speed_max));
    content.push_str(&format!("ApproachSpeedMin={}\n", cfg.approach_speed_min));
    content.push_str(&format!("ExtraRotationsMax={}\n", cfg.extra_rotations_max));
    content.push_str(&format!("ExtraRotationsMin={}\n", cfg.extra_rotations_min));
    content.push_str(&format!(
        "FinalApproachFraction={}\n",
        cfg.final_approach_fraction
    ));
    content.push_str(&format!(
        "FinalApproachMaxSeconds={}\n",
        cfg.final_approach_max_seconds
    ));
    content.push_str(&format!("RampUpSeconds={}\n", cfg.ramp_up_seconds));
    content.push_str(&format!("RevealDelaySeconds={}\n", cfg.reveal_delay_seconds));
    content.push_str(&format!("SettleDistance={}\n", cfg.settle_distance));
    content.push_str(&format!("SettleSpeed={}\n", cfg.settle_speed));
    content.push_str(&format!(
        "SettleTimeoutSeconds={}\n",
        cfg.settle_timeout_seconds
    ));
    content.push_str(&format!("SlotCount={}\n", cfg.slot_count));
    content.push_str(&format!("SlotHeight={}\n", cfg.slot_height));
    content.push_str(&format!("SpringDragMax={}\n", cfg.spring_drag_max));
    content.push_str(&format!("SpringDragMin={}\n", cfg.spring_drag_min));
    content.push_str(&format!(
        "SpringStrengthScale={}\n",
        cfg.spring_strength_scale
    ));
    content.push_str(&format!("TopSpeed={}\n", cfg.top_speed));
    content.push_str(&format!("WindDownCurve={}\n", cfg.wind_down_curve.as_str()));
    content.push_str(&format!("WindDownRotations={}\n", cfg.wind_down_rotations));
    content.push('\n');

    content.push_str("[Game]\n");
    content.push_str(&format!(
        "InitialPlayerCount={}\n",
        cfg.initial_player_count
    ));
    content.push_str(&format!(
        "RerollPlayerCountMax={}\n",
        cfg.reroll_player_count_max
    ));
    content.push_str(&format!(
        "RerollPlayerCountMin={}\n",
        cfg.reroll_player_count_min
    ));
    content.push('\n');

    content.push_str("[Receipt]\n");
    content.push_str(&format!(
        "Command={}\n",
        cfg.print_command.as_deref().unwrap_or("")
    ));
    content.push_str(&format!("Printer={}\n", cfg.printer.as_str()));
    content.push_str(&format!("SpoolPath={}\n", cfg.spool_path));
    content.push('\n');

    content
}

// --- File I/O ---

fn create_default_config_file() -> Result<(), std::io::Error> {
    info!("'{CONFIG_PATH}' not found, creating with default values.");
    std::fs::write(CONFIG_PATH, render_ini(&Config::default()))
}

pub fn load() {
    if !Path::new(CONFIG_PATH).exists()
        && let Err(e) = create_default_config_file()
    {
        warn!("Failed to create default config file: {e}");
    }

    let mut conf = SimpleIni::new();
    match conf.load(CONFIG_PATH) {
        Ok(()) => {
            let loaded = from_ini(&conf);
            info!("Configuration loaded from '{CONFIG_PATH}'.");
            *CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = loaded;
        }
        Err(e) => warn!("Failed to load '{CONFIG_PATH}': {e}. Using default values."),
    }
}

pub fn get() -> Config {
    CONFIG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[cfg(test)]
mod tests {
    use super::{Config, LogLevel, PrinterKind, SimpleIni, from_ini, render_ini};
    use crate::game::spin::WindDownCurve;
    use chrono::NaiveTime;

    fn parsed(text: &str) -> Config {
        let mut ini = SimpleIni::new();
        ini.parse(text);
        from_ini(&ini)
    }

    #[test]
    fn ini_reader_handles_sections_and_comments() {
        let mut ini = SimpleIni::new();
        ini.parse("; top comment\n[Options]\nLogLevel = Debug\n# hash comment\n[Wheel]\nTopSpeed=12.5\n=orphan\n");
        assert_eq!(ini.get("Options", "LogLevel").as_deref(), Some("Debug"));
        assert_eq!(ini.get("Wheel", "TopSpeed").as_deref(), Some("12.5"));
        assert_eq!(ini.get("Wheel", "LogLevel"), None);
    }

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(parsed(""), Config::default());
    }

    #[test]
    fn default_file_round_trips() {
        let cfg = Config::default();
        assert_eq!(parsed(&render_ini(&cfg)), cfg);
    }

    #[test]
    fn recognised_keys_override_defaults() {
        let cfg = parsed(
            "[Options]\nLogLevel=trace\nSeed=42\nRealTime=off\nTimeOfDay=21:30\nFrameRate=120\n\
             [Wheel]\nSlotCount=20\nWindDownCurve=decelerate\nExtraRotationsMin=3\nExtraRotationsMax=4\n\
             [Game]\nInitialPlayerCount=5\n\
             [Receipt]\nPrinter=Spool\nCommand=lp\n",
        );
        assert_eq!(cfg.log_level, LogLevel::Trace);
        assert_eq!(cfg.seed, Some(42));
        assert!(!cfg.real_time);
        assert_eq!(cfg.time_of_day, NaiveTime::from_hms_opt(21, 30, 0));
        assert_eq!(cfg.frame_rate, 120);
        assert_eq!(cfg.slot_count, 20);
        assert_eq!(cfg.wind_down_curve, WindDownCurve::Decelerate);
        assert_eq!(cfg.spin_tuning().extra_rotations_min, 3);
        assert_eq!(cfg.reel_geometry().slot_count, 20);
        assert_eq!(cfg.flow_settings().initial_player_count, 5);
        assert_eq!(cfg.printer, PrinterKind::Spool);
        assert_eq!(cfg.print_command.as_deref(), Some("lp"));
    }

    #[test]
    fn bad_values_fall_back_key_by_key() {
        let cfg = parsed(
            "[Options]\nLogLevel=loud\nSeed=Auto\nTimeOfDay=25:00\n\
             [Wheel]\nTopSpeed=-3\nSlotHeight=abc\nSpringDragMin=5\nSpringDragMax=1\n\
             [Game]\nInitialPlayerCount=40\nRerollPlayerCountMin=0\n",
        );
        let default = Config::default();
        assert_eq!(cfg.log_level, default.log_level);
        assert_eq!(cfg.seed, None);
        assert_eq!(cfg.time_of_day, None);
        assert_eq!(cfg.top_speed, default.top_speed);
        assert_eq!(cfg.slot_height, default.slot_height);
        assert_eq!((cfg.spring_drag_min, cfg.spring_drag_max), (1.0, 5.0));
        assert_eq!(cfg.initial_player_count, 10);
        assert_eq!(cfg.reroll_player_count_min, 1);
    }
}
