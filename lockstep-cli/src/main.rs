//! # Lockstep
//!
//! A terminal media player for local files and `synthetic://` test sources.

use log::error;

mod cli;
mod controls;
mod logging;
mod runner;
mod ui;

fn main() {
    dotenv::dotenv().ok();
    let log_buffer = logging::init();
    let args = cli::args::build_cli().get_matches();

    let code = match runner::run(&args, log_buffer) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            eprintln!("lockstep: {}", err);
            1
        }
    };

    std::process::exit(code)
}
