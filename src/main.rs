extern crate ofctl;

use clap::Parser;
use log::{error, info, Level};
use std::path::PathBuf;
use std::process;

use ofctl::config::ControllerConfig;
use ofctl::ctl;
use ofctl::err::*;

/// Reactive OpenFlow 1.3 learning-switch controller
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// TOML configuration file; built-in defaults when absent
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on for switches, overrides the config file
    #[clap(short, long)]
    listen: Option<String>,

    /// One of error, warn, info, debug, trace
    #[clap(long, default_value = "info")]
    log_level: Level,
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    config.validate()?;
    info!("Listening for switches on {}.", config.listen_addr);
    ctl::start_controller(config)
}

pub fn main() {
    let args = Args::parse();
    if let Err(err) = simple_logger::init_with_level(args.log_level) {
        eprintln!("could not init logger: {}", err);
    }
    if let Err(err) = run(args) {
        error!("{}", err);
        for cause in err.iter().skip(1) {
            error!("caused by: {}", cause);
        }
        process::exit(1);
    }
}
