pub mod assembler;
pub mod sink;

pub use assembler::{pref_field_name, PayloadAssembler, PrefKind, REPORTED_PREFS};
pub use sink::{ChannelSink, JsonLinesSink, TelemetryRecord, TelemetrySink};
