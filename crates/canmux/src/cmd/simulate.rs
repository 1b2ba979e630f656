use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use canmux_dispatch::Dispatcher;
use canmux_driver::{
    AutoSupportProtocol, CaptureLogger, ComDriver, CyclicMessageSpec, DriverConfig, StatsLogger,
    TracingLogger,
};
use canmux_transport::VirtualChannel;
use tracing::info;

use crate::cmd::SimulateArgs;
use crate::exit::{driver_error, io_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_summary, OutputFormat, SimulationSummary};

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = match &args.config {
        Some(path) => DriverConfig::from_json_file(path)
            .map_err(|err| driver_error(&format!("failed loading {}", path.display()), err))?,
        None => DriverConfig::default(),
    };
    if config.cyclic.is_empty() {
        info!("no cyclic messages configured, using demo schedule");
        config.cyclic = demo_schedule();
    }

    let channel = Arc::new(VirtualChannel::new("sim").with_loopback(true));
    let dispatcher = Arc::new(Dispatcher::new(channel));
    let mut driver = ComDriver::new(dispatcher, &config)
        .map_err(|err| driver_error("driver setup failed", err))?;
    driver
        .apply_config(&config)
        .map_err(|err| driver_error("invalid configuration", err))?;

    let stats = StatsLogger::new();
    driver.add_logger(Box::new(stats.clone()));
    driver.add_logger(Box::new(TracingLogger::new()));

    if let Some(path) = &args.capture {
        let file = File::create(path)
            .map_err(|err| io_error(&format!("failed creating {}", path.display()), err))?;
        driver.add_logger(Box::new(CaptureLogger::new(BufWriter::new(file))));
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let started = Instant::now();
    driver.start_logging();
    while running.load(Ordering::SeqCst) && started.elapsed() < args.duration {
        driver.distribute_messages();
        thread::sleep(args.tick);
    }

    // Stopping zeroes the pushed statistics, so read them first.
    let snapshot = stats.snapshot();
    driver.stop_logging();

    let summary = SimulationSummary {
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        cyclic_messages: driver.cyclic_count(),
        stats: snapshot,
        capture: args
            .capture
            .as_ref()
            .map(|path| path.display().to_string()),
        captured_frames: args
            .capture
            .as_ref()
            .map(|_| snapshot.rx_frames + snapshot.tx_frames),
    };
    print_summary(&summary, format);
    Ok(SUCCESS)
}

fn demo_schedule() -> Vec<CyclicMessageSpec> {
    vec![
        CyclicMessageSpec {
            id: 0x100,
            extended: false,
            remote: false,
            data: vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x00, 0x00],
            interval_ms: 100,
            auto_support: Some(AutoSupportProtocol::CounterCrc),
        },
        CyclicMessageSpec {
            id: 0x200,
            extended: false,
            remote: false,
            data: vec![0x0F, 0xF0, 0xAA, 0x55],
            interval_ms: 250,
            auto_support: Some(AutoSupportProtocol::InvertedDuplicate),
        },
        CyclicMessageSpec {
            id: 0x18FF_0010,
            extended: true,
            remote: false,
            data: vec![1, 2, 3],
            interval_ms: 500,
            auto_support: None,
        },
    ]
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
