//! Injected logging sink.
//!
//! The core must remain loggable through a caller-supplied hook and must
//! never reach for a global logger itself. Every component that wants to
//! log takes a `&dyn Sink` (or the no-op default) instead.

/// Severity, mirroring the levels the `log` crate defines so [`LogFacade`]
/// can forward to it without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// `(level, component, message)` sink the core logs through instead of
/// reaching for a global logger.
pub trait Sink: Send + Sync {
    fn log(&self, level: Level, component: &str, message: &str);
}

/// Drops every record. Used when a caller installs no sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl Sink for NullSink {
    fn log(&self, _level: Level, _component: &str, _message: &str) {}
}

/// Forwards records to the `log` crate's global facade, giving callers the
/// conventional "just use `log`/`env_logger`/`fern`" experience the `devel`
/// feature provides, without the core depending on it directly.
#[cfg(feature = "log")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacade;

#[cfg(feature = "log")]
impl Sink for LogFacade {
    fn log(&self, level: Level, component: &str, message: &str) {
        let level = match level {
            Level::Trace => log::Level::Trace,
            Level::Debug => log::Level::Debug,
            Level::Info => log::Level::Info,
            Level::Warn => log::Level::Warn,
            Level::Error => log::Level::Error,
        };
        log::log!(level, "[{component}] {message}");
    }
}

/// Shorthand for a shared, thread-safe sink handle, the form every
/// component and the orchestrator accept.
pub type SharedSink = std::sync::Arc<dyn Sink>;

pub fn null_sink() -> SharedSink {
    std::sync::Arc::new(NullSink)
}

#[cfg(feature = "log")]
pub fn log_facade() -> SharedSink {
    std::sync::Arc::new(LogFacade)
}
