//! Cryostat vibration-isolation platform supervisor binary (C12 lifecycle).
//!
//! Loads configuration, connects the ADC link, opens the observer listen
//! socket, and drives the [`cryo_supervisor::Engine`] from a fixed-period
//! scheduler loop until SIGINT. Real USB controller hardware is out of
//! scope for this build (see [`cryo_hal::usb::transport::NullUsbTransport`]);
//! the engine still runs its full ADC/observer/control-law surface without
//! one ever attaching.

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cryo_common::config::{ConfigLoader, SupervisorConfig};
use cryo_common::consts::DEFAULT_CONFIG_PATH;
use cryo_hal::adc::transport::TcpAdcTransport;
use cryo_hal::usb::transport::NullUsbTransport;
use cryo_observer::transport::TcpObserverTransport;
use cryo_supervisor::{Engine, LogSink};

#[derive(Parser, Debug)]
#[command(name = "cryo_supervisor", about = "Cryostat vibration-isolation platform supervisor")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable debug-level tracing.
    #[arg(short, long)]
    verbose: bool,

    /// Emit tracing output as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env().add_directive(level.parse().unwrap());

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

type SupervisorEngine = Engine<NullUsbTransport, TcpAdcTransport, TcpObserverTransport>;

enum ObserverEvent {
    Connected(TcpObserverTransport),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    let config = match SupervisorConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %args.config.display(), "failed to load configuration");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        error!(error = %e, "configuration validation failed");
        std::process::exit(1);
    }

    run(config)
}

fn run(config: SupervisorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let tick_period = Duration::from_millis(config.tick_period_ms);
    let adc_addr = format!("{}:{}", config.network.adc_host, config.network.adc_port);
    let bind_addr = config.network.bind_addr.clone();
    let log_dir = config.log_dir.clone();

    let mut engine: SupervisorEngine = Engine::new(config, LogSink::new(PathBuf::from(&log_dir)));

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let (tx, rx) = mpsc::channel::<ObserverEvent>();
    let listener = TcpListener::bind(&bind_addr)?;
    info!(addr = %bind_addr, "observer listener bound");
    spawn_accept_thread(listener, tx, Arc::clone(&running));

    info!("supervisor starting");
    let start = Instant::now();
    let mut next_tick = start;
    let mut next_observer_id: u64 = 1;

    while running.load(Ordering::SeqCst) {
        if engine.adc_needs_reconnect() {
            match TcpAdcTransport::connect(&adc_addr) {
                Ok(transport) => engine.adc_connect(transport),
                Err(e) => warn!(error = %e, addr = %adc_addr, "adc connect failed, will retry"),
            }
        }

        while let Ok(event) = rx.try_recv() {
            match event {
                ObserverEvent::Connected(stream) => {
                    let _ = next_observer_id;
                    engine.observer_connect(stream);
                }
            }
        }

        let now_ms = start.elapsed().as_millis() as u64;
        engine.tick(now_ms);

        next_tick += tick_period;
        let now = Instant::now();
        if next_tick > now {
            std::thread::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
    }

    info!("supervisor shutting down");
    std::thread::sleep(Duration::from_millis(10));
    Ok(())
}

fn spawn_accept_thread(listener: TcpListener, tx: mpsc::Sender<ObserverEvent>, running: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let mut next_id: u64 = 1;
        for incoming in listener.incoming() {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            match incoming {
                Ok(stream) => match TcpObserverTransport::from_stream(next_id, stream) {
                    Ok(transport) => {
                        next_id += 1;
                        if tx.send(ObserverEvent::Connected(transport)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to wrap observer connection"),
                },
                Err(e) => warn!(error = %e, "observer accept failed"),
            }
        }
    });
}
