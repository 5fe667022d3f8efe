use std::io;

use checkin_app::app::{run, AppConfig, Cli};
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    let config = AppConfig::from_env().unwrap_or_default();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(config.log_level())
        .init();
    if let Err(err) = run(config, cli, &mut io::stdout().lock()) {
        eprintln!("checkin: {err:#}");
        std::process::exit(1);
    }
}
