use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::{ArgAction, Parser};
use log::{LevelFilter, error, info};

use dap_sniffer::{
    assembler::DeviceFilter,
    capture::{CaptureError, EventReader, Recorder},
    decode_events,
    usbmon::{BusEvent, USBMON_DEBUGFS},
};

type Events = Box<dyn Iterator<Item = Result<BusEvent, CaptureError>>>;

/// Decode CMSIS-DAP traffic captured by Linux usbmon.
///
/// Reads usbmon `u` text from stdin unless `--bus` or `--load` is given:
///
///     sudo cat /sys/kernel/debug/usb/usbmon/2u | dap-sniffer 16
#[derive(Parser, Debug)]
#[command(name = "dap-sniffer", version, verbatim_doc_comment)]
struct Cli {
    /// Only decode traffic of this USB device address
    device: Option<u8>,

    /// Read the usbmon text file of this bus directly
    #[arg(long)]
    bus: Option<u16>,

    /// Save the captured bus events to this file
    #[arg(long, conflicts_with = "load")]
    save: Option<PathBuf>,

    /// Replay bus events from a saved capture or usbmon text file
    #[arg(long, conflicts_with = "bus")]
    load: Option<PathBuf>,

    /// Log more (repeat for trace output)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Error,
            (false, 0) => LevelFilter::Warn,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        }
    }

    fn events(&self) -> Result<Events, CaptureError> {
        let events: Events = match (&self.load, self.bus) {
            (Some(path), _) => Box::new(EventReader::open(path)?),
            (None, Some(bus)) => {
                let path = PathBuf::from(USBMON_DEBUGFS).join(format!("{bus}u"));
                Box::new(EventReader::open(path)?)
            }
            (None, None) => Box::new(EventReader::new(io::stdin().lock())),
        };

        let events: Events = match &self.save {
            Some(path) => Box::new(Recorder::create(events, path)?),
            None => events,
        };
        Ok(events)
    }
}

fn main() -> Result<(), CaptureError> {
    let cli = Cli::parse();

    if let Err(err) = simplelog::TermLogger::init(
        cli.log_level(),
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("Logging unavailable: {err}");
    }

    let filter = DeviceFilter {
        // Bus 0 is the usbmon file for all buses.
        bus: cli.bus.filter(|&bus| bus != 0),
        device: cli.device,
    };
    info!("Decoding with {filter:?}");

    // Parse failures are skipped by the reader; anything that still reaches
    // here ends the capture.
    let mut fatal = None;
    let events = cli
        .events()?
        .map_while(|event| event.map_err(|err| fatal = Some(err)).ok());

    let mut stdout = io::stdout().lock();
    for line in decode_events(events, filter) {
        writeln!(stdout, "{line}")?;
    }

    match fatal {
        Some(err) => {
            error!("Capture ended: {err}");
            Err(err)
        }
        None => Ok(()),
    }
}
