//! Custom tracing formatter that stamps every event with the emulated frame counter

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use time::macros::format_description;
use time::{format_description::FormatItem, OffsetDateTime};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

/// Frames advanced by every engine in the process
static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Frame numbers are shown as 6 hex digits
const FRAME_DISPLAY_MASK: u64 = 0xFF_FFFF;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second].[subsecond digits:5]");

/// Full-style formatter prefixed with a wall-clock timestamp and the frame counter in hex.
///
/// Wall-clock and emulated time drift apart while the worker idles, so both are shown.
pub struct CustomFormatter;

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let meta = event.metadata();

        let timestamp = OffsetDateTime::now_utc().format(&TIMESTAMP_FORMAT).map_err(|err| {
            eprintln!("Failed to format timestamp: {err}");
            fmt::Error
        })?;
        styled(&mut writer, DIM, timestamp)?;
        writer.write_char(' ')?;
        styled(&mut writer, DIM, format_args!("f{:06X}", frame_count() & FRAME_DISPLAY_MASK))?;
        writer.write_char(' ')?;

        let (color, label) = level_style(meta.level());
        styled(&mut writer, color, label)?;
        writer.write_char(' ')?;

        // Span chain from the root, e.g. `worker{rom=..}:`
        if let Some(scope) = ctx.event_scope() {
            let mut any = false;
            for span in scope.from_root() {
                any = true;
                styled(&mut writer, BOLD, span.metadata().name())?;
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>().filter(|f| !f.is_empty()) {
                    styled(&mut writer, BOLD, '{')?;
                    write!(writer, "{fields}")?;
                    styled(&mut writer, BOLD, '}')?;
                }
                styled(&mut writer, DIM, ':')?;
            }
            if any {
                writer.write_char(' ')?;
            }
        }

        styled(&mut writer, DIM, format_args!("{}:", meta.target()))?;
        writer.write_char(' ')?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";

/// ANSI color and right-aligned label for a level.
fn level_style(level: &Level) -> (&'static str, &'static str) {
    match *level {
        Level::TRACE => ("\x1b[35m", "TRACE"),
        Level::DEBUG => ("\x1b[34m", "DEBUG"),
        Level::INFO => ("\x1b[32m", " INFO"),
        Level::WARN => ("\x1b[33m", " WARN"),
        Level::ERROR => ("\x1b[31m", "ERROR"),
    }
}

/// Writes `value`, wrapped in `style` and a reset when the writer supports ANSI.
fn styled(writer: &mut Writer<'_>, style: &str, value: impl fmt::Display) -> fmt::Result {
    if writer.has_ansi_escapes() {
        write!(writer, "{style}{value}\x1b[0m")
    } else {
        write!(writer, "{value}")
    }
}

/// Records `frames` emulated frames. Called by whoever ticks an engine.
pub fn advance_frames(frames: u64) {
    FRAME_COUNTER.fetch_add(frames, Ordering::Relaxed);
}

/// Frames advanced so far across all engines.
pub fn frame_count() -> u64 {
    FRAME_COUNTER.load(Ordering::Relaxed)
}
