//! A [`log`] backend that writes every record into a text sink,
//! like the UART of the machine.

use core::fmt::{self, Write};
use owo_colors::{colors, OwoColorize};
use spin::Mutex;

/// Logger that formats records as `[ LEVEL ] [module] message` lines
/// and writes them into the sink `W`.
pub struct Logger<W> {
    sink: Mutex<W>,
}

impl<W: Write + Send> Logger<W> {
    /// Create a new logger that writes into `sink`.
    pub const fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Run `f` with exclusive access to the sink.
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.sink.lock())
    }

    fn write_record(&self, record: &log::Record<'_>) -> fmt::Result {
        let mod_path = record
            .module_path_static()
            .or_else(|| record.module_path())
            .unwrap_or("<n/a>");

        let mut sink = self.sink.lock();
        write!(sink, "[ ")?;
        match record.level() {
            log::Level::Error => write!(sink, "{:>5}", "ERROR".fg::<colors::Red>())?,
            log::Level::Warn => write!(sink, "{:>5}", "WARN".fg::<colors::Yellow>())?,
            log::Level::Info => write!(sink, "{:>5}", "INFO".fg::<colors::Cyan>())?,
            log::Level::Debug => write!(sink, "{:>5}", "DEBUG".fg::<colors::Magenta>())?,
            log::Level::Trace => write!(sink, "{:>5}", "TRACE".dimmed())?,
        }
        writeln!(sink, " ] [{}] {}", mod_path, record.args())
    }
}

impl<W: Write + Send> log::Log for Logger<W> {
    #[allow(unused_variables)]
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        #[cfg(any(debug_assertions, feature = "logging"))]
        return true;
        #[cfg(all(not(debug_assertions), not(feature = "logging")))]
        return metadata.level() <= log::Level::Info;
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            let _ = self.write_record(record);
        }
    }

    fn flush(&self) {}
}

/// Install `logger` as the global logger.
pub fn init_logging<W: Write + Send>(
    logger: &'static Logger<W>,
) -> Result<(), log::SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
