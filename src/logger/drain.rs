use super::Logger;
use crate::domain::entry::{LogEntry, Severity, SourceLocation};
use slog::{Drain, Key, Level, Never, OwnedKVList, Record, Serializer, KV};
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;

/// Collects key/values as labels. Later keys replace earlier ones.
#[derive(Default)]
struct LabelSerializer {
    labels: HashMap<String, String>,
}

impl Serializer for LabelSerializer {
    fn emit_arguments(&mut self, key: Key, val: &fmt::Arguments) -> slog::Result {
        self.labels.insert(key.to_string(), val.to_string());
        Ok(())
    }
}

/// Lets the logger be the root drain of an `slog` logger:
///
/// ```no_run
/// # async fn example(logger: guestlog::Logger) {
/// let root = slog::Logger::root(std::sync::Arc::new(logger), slog::o!("component" => "agent"));
/// slog::info!(root, "started"; "version" => 3);
/// # }
/// ```
///
/// Key/values of the record and of the `slog` logger become entry labels; the record's
/// location becomes the entry's source.
impl Drain for Logger {
    type Ok = ();
    type Err = Never;

    fn log(&self, record: &Record, values: &OwnedKVList) -> Result<(), Never> {
        let mut serializer = LabelSerializer::default();
        // Record values are more specific, so they go last.
        let _ = values.serialize(record, &mut serializer);
        let _ = record.kv().serialize(record, &mut serializer);

        let entry = LogEntry::new(Severity::from(record.level()), record.msg().to_string())
            .with_labels(serializer.labels)
            .with_source(SourceLocation::new(
                record.file(),
                record.line(),
                record.module(),
            ));
        self.dispatch(entry, Location::caller());
        Ok(())
    }

    #[inline]
    fn is_enabled(&self, level: Level) -> bool {
        level.is_at_least(Level::Info) || self.debug_enabled()
    }
}
