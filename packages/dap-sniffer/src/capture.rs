//! Reading bus events from live usbmon output or capture files, and saving them.
//!
//! A capture file holds one JSON-encoded [`BusEvent`] per line. Readers accept
//! either that format or raw usbmon text, decided by the first non-blank line.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, LineWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use thiserror::Error;

use crate::usbmon::BusEvent;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("IO Error: {0}")]
    IoError(#[from] io::Error),

    #[error("Could not open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Could not write capture: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Format {
    Undetected,
    Json,
    Usbmon,
}

/// Streams [`BusEvent`]s out of a line-oriented source.
///
/// Lines that fail to parse are logged and skipped. Read failures end the
/// stream with an error.
pub struct EventReader<R> {
    lines: io::Lines<R>,
    format: Format,
    line_number: usize,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            format: Format::Undetected,
            line_number: 0,
        }
    }
}

impl EventReader<BufReader<File>> {
    /// Opens a capture file or usbmon debugfs file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CaptureError::Open {
            path: path.to_owned(),
            source,
        })?;
        debug!("Reading bus events from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<BusEvent, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            self.line_number += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if self.format == Format::Undetected {
                self.format = if line.starts_with('{') {
                    Format::Json
                } else {
                    Format::Usbmon
                };
                debug!("Detected {:?} input", self.format);
            }

            let parsed = match self.format {
                Format::Json => {
                    serde_json::from_str::<BusEvent>(line).map_err(|err| err.to_string())
                }
                _ => line.parse::<BusEvent>().map_err(|err| err.to_string()),
            };
            match parsed {
                Ok(event) => return Some(Ok(event)),
                Err(err) => warn!("Skipping line {}: {err}", self.line_number),
            }
        }
    }
}

/// Writes every event passing through it to a capture file.
pub struct Recorder<I, W> {
    events: I,
    output: W,
}

impl<I> Recorder<I, LineWriter<File>> {
    /// Creates (or truncates) the capture file at `path`.
    ///
    /// Each event is flushed as soon as it is written, so an interrupted live
    /// capture keeps everything seen so far.
    pub fn create(events: I, path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| CaptureError::Open {
            path: path.to_owned(),
            source,
        })?;
        debug!("Saving bus events to {}", path.display());
        Ok(Self::new(events, LineWriter::new(file)))
    }
}

impl<I, W: Write> Recorder<I, W> {
    pub fn new(events: I, output: W) -> Self {
        Self { events, output }
    }

    fn record(&mut self, event: &BusEvent) -> Result<(), CaptureError> {
        serde_json::to_writer(&mut self.output, event)?;
        self.output.write_all(b"\n")?;
        Ok(())
    }
}

impl<I, W> Iterator for Recorder<I, W>
where
    I: Iterator<Item = Result<BusEvent, CaptureError>>,
    W: Write,
{
    type Item = Result<BusEvent, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        let event = match self.events.next()? {
            Ok(event) => event,
            Err(err) => return Some(Err(err)),
        };
        Some(self.record(&event).map(|()| event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usbmon::{Direction, EventPhase};

    const USBMON: &str = "\
a 1 S Bo:2:016:2 -115 2 = 0200
this is not usbmon

a 2 C Bo:2:016:2 0 2 >
";

    #[test]
    fn reads_usbmon_text() {
        let events: Vec<BusEvent> = EventReader::new(USBMON.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].phase, EventPhase::Submission);
        assert_eq!(events[1].phase, EventPhase::Callback);
    }

    #[test]
    fn saved_capture_loads_back() {
        let mut saved = Vec::new();
        let recorded: Vec<BusEvent> =
            Recorder::new(EventReader::new(USBMON.as_bytes()), &mut saved)
                .collect::<Result<_, _>>()
                .unwrap();

        let text = String::from_utf8(saved).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with('{'));

        let loaded: Vec<BusEvent> = EventReader::new(text.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(loaded, recorded);
        assert_eq!(loaded[0].direction, Direction::Out);
        assert_eq!(loaded[0].data, Some(vec![0x02, 0x00]));
    }

    #[test]
    fn json_capture_skips_bad_lines() {
        let event: BusEvent = "a 1 S Bo:2:016:2 -115 1 = 03".parse().unwrap();
        let input = format!(
            "{}\n{{\"urb_tag\": 5}}\n",
            serde_json::to_string(&event).unwrap()
        );
        let loaded: Vec<BusEvent> = EventReader::new(input.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(loaded, vec![event]);
    }

    #[test]
    fn missing_file() {
        let err = EventReader::open("/nonexistent/capture.jsonl").err().unwrap();
        assert!(matches!(err, CaptureError::Open { .. }));
        assert!(err.to_string().starts_with("Could not open /nonexistent/capture.jsonl"));
    }
}
