//! Stamps entries with their local timestamp and call site.

use crate::domain::entry::{Event, LogEntry, SourceLocation};
use backtrace::{Backtrace, BacktraceSymbol};
use chrono::Local;
use std::panic::Location;

/// RFC 3339 with microseconds and a numeric UTC offset.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// Frames whose symbols start with this belong to the logger itself.
const CRATE_PREFIX: &str = concat!(env!("CARGO_CRATE_NAME"), "::");

/// The current local time in the format used for [`Event::local_timestamp`].
pub fn now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Turns an entry into an [`Event`]. `caller` is the tracked location of the public entry
/// point that received the entry.
pub(crate) fn enrich(mut entry: LogEntry, caller: &'static Location<'static>) -> Event {
    let source = match (entry.source.take(), entry.call_depth) {
        (Some(source), _) => source,
        (None, None) => SourceLocation::new(caller.file(), caller.line(), ""),
        (None, Some(depth)) => caller_at_depth(depth),
    };
    Event::new(entry, now(), source)
}

/// Walks the stack: past this function (the "+1"), past every frame of this crate, then
/// `depth` frames more. Gives [`SourceLocation::unknown`] when symbols are unavailable.
#[inline(never)]
pub(crate) fn caller_at_depth(depth: usize) -> SourceLocation {
    let trace = Backtrace::new();
    let symbols = trace.frames().iter().flat_map(|frame| frame.symbols());
    locate(symbols, depth).unwrap_or_else(SourceLocation::unknown)
}

fn symbol_name(symbol: &BacktraceSymbol) -> Option<String> {
    symbol.name().map(|name| format!("{:#}", name))
}

fn is_internal(name: &str) -> bool {
    name.trim_start_matches('<').starts_with(CRATE_PREFIX)
}

fn locate<'a, I>(symbols: I, depth: usize) -> Option<SourceLocation>
where
    I: Iterator<Item = &'a BacktraceSymbol>,
{
    let mut symbols = symbols
        .filter_map(|symbol| symbol_name(symbol).map(|name| (name, symbol)))
        .skip_while(|(name, _)| !name.contains("caller_at_depth"))
        .skip(1)
        .skip_while(|(name, _)| is_internal(name))
        .skip(depth);

    let (function, symbol) = symbols.next()?;
    let file = symbol.filename()?.to_string_lossy().into_owned();
    Some(SourceLocation::new(
        &file,
        symbol.lineno().unwrap_or(0),
        &function,
    ))
}
