use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::config::ControllerConfig;
use super::err::*;

pub mod controller;
pub mod decision;
pub mod installer;
pub mod learning;
pub mod session;
pub mod switch;

use self::controller::Controller;

/// Binds the configured address and serves switches until the listener fails.
pub fn start_controller(config: ControllerConfig) -> Result<()> {
    // try starting tcp listener at given address
    info!("Starting tcp listener.");
    let listener = TcpListener::bind(&config.listen_addr)
        .chain_err(|| format!("could not listen on {}", config.listen_addr))?;
    info!(
        "Tcp listener successfully started at {:?}.",
        listener.local_addr()
    );
    serve(listener, Arc::new(Controller::new(config)))
}

/// Accepts switch connections on `listener`, each driven by its own threads.
pub fn serve(listener: TcpListener, controller: Arc<Controller>) -> Result<()> {
    if let Some(interval) = controller.config().learning.sweep_interval() {
        spawn_sweeper(controller.clone(), interval)?;
    }

    // endless loop -> accept incoming switches
    info!("Starting tcp accept.");
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Accept failed: {}.", err);
                continue;
            }
        };
        info!("Tcp connection from: {:?}.", stream.peer_addr());
        if let Err(err) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY: {}.", err);
        }
        if let Err(err) = switch::start_switch_connection(stream, controller.clone()) {
            error!("Could not start switch connection: {}.", err);
        }
    }

    // only reached when the listener is closed
    Ok(())
}

fn spawn_sweeper(controller: Arc<Controller>, interval: Duration) -> Result<()> {
    info!("Starting age sweeper every {:?}.", interval);
    thread::Builder::new()
        .name("Age-Sweeper".to_string())
        .spawn(move || loop {
            thread::sleep(interval);
            controller.age_sweep(Instant::now());
        })?;
    Ok(())
}
