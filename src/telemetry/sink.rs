use std::{
    collections::BTreeMap,
    io::{self, Write},
    sync::Mutex,
};

use tokio::sync::mpsc;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_warn};

/// Flat string → string record, one per page-visit.
pub type TelemetryRecord = BTreeMap<String, String>;

/// Outbound delivery. Fire-and-forget: the core never waits for an acknowledgment.
pub trait TelemetrySink: Send + Sync {
    fn send(&self, record: TelemetryRecord);
}

/// Writes each record as one JSON line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> TelemetrySink for JsonLinesSink<W> {
    fn send(&self, record: TelemetryRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                log_error!("Failed to serialize telemetry record: {err}");
                return;
            }
        };

        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
            log_error!("Failed to write telemetry record: {err}");
        }
    }
}

/// Forwards records to an async consumer, e.g. a network uploader.
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<TelemetryRecord>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TelemetryRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl TelemetrySink for ChannelSink {
    fn send(&self, record: TelemetryRecord) {
        if self.sender.send(record).is_err() {
            log_warn!("Telemetry receiver dropped; record discarded");
        }
    }
}
