mod app;
mod config;
mod core;
mod game;
mod receipt;
mod screens;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logger first so config loading can report problems; the level is narrowed afterwards.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    log::set_max_level(log::LevelFilter::Warn);

    config::load();
    log::set_max_level(config::get().log_level.as_level_filter());
    app::run()
}
