use clap::Parser;
use k1b_perf_core::sim::{self, SimulatedPmu};
use k1b_perf_core::{Event, Monitor, PerfError, PerfMonitors};
use log::{debug, info};
use std::process::ExitCode;
use stderrlog::LogLevelNum;

/// Measure a busy-wait with a performance monitor of a simulated K1B processing unit.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Monitor to measure with (0 = pm0+pm1, 1 = pm2+pm3).
    #[arg(short, long, default_value_t = 0)]
    monitor: i32,
    /// Event to count, by name or number.
    #[arg(short, long, default_value_t = Event::Cycles)]
    event: Event,
    /// Number of cycles to busy-wait while the monitor runs.
    #[arg(short, long, default_value_t = 1000)]
    cycles: u64,
    /// Occurrences of the event to deliver while the monitor runs, if it isn't `cycles`.
    #[arg(short, long, default_value_t = 0)]
    occurrences: u64,
    /// Cycles charged for every register access.
    #[arg(long, default_value_t = 0)]
    access_cost: u32,
    /// Print the supported events and exit.
    #[arg(long)]
    list_events: bool,
    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let verbosity = match args.verbose {
        0 => LogLevelNum::Warn,
        1 => LogLevelNum::Info,
        2 => LogLevelNum::Debug,
        _ => LogLevelNum::Trace,
    };
    if let Err(err) = stderrlog::new()
        .verbosity(verbosity)
        .modules([module_path!(), "k1b_perf_core"])
        .init()
    {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    if args.list_events {
        for event in Event::ALL {
            println!("{:>2}  {:<14} {}", u8::from(event), event, event.description());
        }
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err} ({})", err.errno());
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), PerfError> {
    let config = sim::Config {
        access_cost: args.access_cost,
        ..sim::Config::default()
    };
    debug!("simulating processing unit with {config:?}");

    let mut monitors = PerfMonitors::new(SimulatedPmu::new(config));
    monitors.setup();

    let monitor = Monitor::new(args.monitor).ok_or(PerfError::InvalidMonitor)?;
    monitors.start(monitor, args.event)?;
    info!("monitor {monitor} counting {}", args.event.description());

    monitors.platform_mut().busy_wait(args.cycles);
    if args.event != Event::Cycles {
        monitors.platform_mut().record(args.event, args.occurrences);
    }

    monitors.stop(monitor)?;
    let count = monitors.try_read(monitor)?;

    let expected = match args.event {
        Event::Cycles => args.cycles,
        _ => args.occurrences,
    };
    println!("{}: {count}", args.event);
    println!("overhead: {}", count.saturating_sub(expected));
    Ok(())
}
