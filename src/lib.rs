pub mod blackjack;
pub mod coin_bet;
pub mod error;
pub mod random_walk;
pub mod solver;

pub use error::{Error, Result};

// Terminal logger for the binaries.
pub fn init_logging(level: log::LevelFilter) {
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    // A logger may already be installed, e.g. by a test harness.
    let _ = simplelog::TermLogger::init(
        level,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
}
