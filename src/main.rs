use clap::Parser;

use cladoview::app::{App, AppConfig};

fn main() {
    let _ = env_logger::builder().format_timestamp(None).try_init();

    let config = AppConfig::parse();
    if let Err(err) = App::run(&config) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
