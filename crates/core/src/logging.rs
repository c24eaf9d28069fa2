//! Category-based logging for the rendering engines
//!
//! Rendering code runs tight per-pixel loops on many threads, so logging has
//! to cost nothing when disabled and must not flood the output when enabled.
//!
//! # Architecture
//!
//! - **LogConfig**: global configuration held in atomics
//! - **LogLevel**: ordered levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: engine subsystems (raster, tasks, shading, ...)
//! - **log()**: lazily formatted, rate-limited entry point
//!
//! Messages that pass the category filter and the rate limiter are handed to
//! the [`log`](https://docs.rs/log) facade with a `pgl::<category>` target, so
//! any logger installed by the binary (e.g. `env_logger`) decides where they go.
//!
//! # Usage
//!
//! ```rust
//! use pgl_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Tasks, LogLevel::Debug, || {
//!     format!("{} tasks outstanding", 3)
//! });
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

const CATEGORY_COUNT: usize = 6;

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }

    /// Matching `log` crate level, `None` for `Off`
    fn to_log(self) -> Option<log::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(log::Level::Error),
            LogLevel::Warn => Some(log::Level::Warn),
            LogLevel::Info => Some(log::Level::Info),
            LogLevel::Debug => Some(log::Level::Debug),
            LogLevel::Trace => Some(log::Level::Trace),
        }
    }
}

/// Engine subsystem a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Triangle setup, culling and fragment retries
    Raster,
    /// Worker pool and task accounting
    Tasks,
    /// Shader selection and lighting
    Shading,
    /// Texture loading and caching
    Texture,
    /// Scene traversal
    Scene,
    /// Depth/color buffer management, periodization
    Buffer,
}

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::Raster,
        LogCategory::Tasks,
        LogCategory::Shading,
        LogCategory::Texture,
        LogCategory::Scene,
        LogCategory::Buffer,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::Raster => 0,
            LogCategory::Tasks => 1,
            LogCategory::Shading => 2,
            LogCategory::Texture => 3,
            LogCategory::Scene => 4,
            LogCategory::Buffer => 5,
        }
    }

    /// `log` target used when forwarding messages
    pub fn target(self) -> &'static str {
        match self {
            LogCategory::Raster => "pgl::raster",
            LogCategory::Tasks => "pgl::tasks",
            LogCategory::Shading => "pgl::shading",
            LogCategory::Texture => "pgl::texture",
            LogCategory::Scene => "pgl::scene",
            LogCategory::Buffer => "pgl::buffer",
        }
    }
}

#[derive(Default)]
struct Window {
    timestamps: VecDeque<Instant>,
    dropped: usize,
    last_drop_report: Option<Instant>,
}

/// Sliding-window rate limiter, one window per category
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window_duration: Duration,
    windows: Mutex<[Window; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window_duration: Duration::from_secs(1),
            windows: Mutex::new(Default::default()),
        }
    }

    fn set_max_logs_per_second(&self, max: usize) {
        self.max_logs_per_second.store(max, Ordering::Relaxed);
    }

    fn get_max_logs_per_second(&self) -> usize {
        self.max_logs_per_second.load(Ordering::Relaxed)
    }

    /// Returns `(allowed, dropped)` where `dropped` is set when a drop
    /// summary is due
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = &mut windows[category.index()];

        while let Some(&front) = window.timestamps.front() {
            if now.duration_since(front) > self.window_duration {
                window.timestamps.pop_front();
            } else {
                break;
            }
        }

        if window.timestamps.len() < self.get_max_logs_per_second() {
            window.timestamps.push_back(now);
            if window.dropped > 0 {
                let dropped = std::mem::take(&mut window.dropped);
                window.last_drop_report = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        window.dropped += 1;
        let report_due = match window.last_drop_report {
            None => true,
            Some(last) => now.duration_since(last) >= self.window_duration,
        };
        if report_due {
            let dropped = std::mem::take(&mut window.dropped);
            window.last_drop_report = Some(now);
            (false, Some(dropped))
        } else {
            (false, None)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    /// Applies to every category without its own level
    global_level: AtomicU8,
    category_levels: [AtomicU8; CATEGORY_COUNT],
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// All logging off, 60 messages per second per category
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: Default::default(),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category level other than `Off` overrides the global level
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Set the maximum logs per second per category
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter.set_max_logs_per_second(max_logs_per_second);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.get_max_logs_per_second()
    }
}

/// Log a lazily formatted message
///
/// The closure only runs when the category accepts `level` and the rate
/// limiter lets the message through. Dropped messages are summarized with a
/// warning once per second.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }
    let Some(log_level) = level.to_log() else {
        return;
    };

    let (allowed, dropped) = config.rate_limiter.should_allow(category);
    if let Some(count) = dropped.filter(|&c| c > 0) {
        log::warn!(
            target: category.target(),
            "rate limit exceeded, {} message(s) dropped in the last second",
            count
        );
    }
    if allowed {
        log::log!(target: category.target(), log_level, "{}", message_fn());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("ERR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("Debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("verbose"), None);
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::Tasks, LogLevel::Debug);

        assert!(config.should_log(LogCategory::Tasks, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Raster, LogLevel::Warn));
        assert!(config.should_log(LogCategory::Raster, LogLevel::Error));
        assert!(!config.should_log(LogCategory::Raster, LogLevel::Off));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::Texture, LogLevel::Info);
        config.reset();

        assert_eq!(config.get_global_level(), LogLevel::Off);
        for category in LogCategory::ALL {
            assert_eq!(config.get_level(category), LogLevel::Off);
        }
    }

    #[test]
    fn test_rate_limiter_blocks_over_limit() {
        let limiter = RateLimiter::new(60);
        for _ in 0..60 {
            let (allowed, _) = limiter.should_allow(LogCategory::Raster);
            assert!(allowed, "Should allow logs within the rate limit");
        }
        let (allowed, _) = limiter.should_allow(LogCategory::Raster);
        assert!(!allowed, "Should block logs exceeding the rate limit");

        let (allowed, _) = limiter.should_allow(LogCategory::Buffer);
        assert!(allowed, "Other categories keep their own window");
    }

    #[test]
    fn test_rate_limiter_reports_dropped_count() {
        let limiter = RateLimiter::new(5);
        for _ in 0..5 {
            limiter.should_allow(LogCategory::Tasks);
        }
        for _ in 0..10 {
            limiter.should_allow(LogCategory::Tasks);
        }

        std::thread::sleep(Duration::from_millis(1100));

        let (allowed, dropped) = limiter.should_allow(LogCategory::Tasks);
        assert!(allowed, "Should be allowed after window slides");
        // The first drop is reported immediately, the rest on the next pass
        let dropped = dropped.expect("dropped count");
        assert!((9..=10).contains(&dropped), "got {}", dropped);
    }

    #[test]
    fn test_disabled_log_never_formats() {
        let mut called = false;
        log(LogCategory::Scene, LogLevel::Trace, || {
            called = true;
            String::new()
        });
        assert!(!called);
    }
}
