//! Process-wide tracing setup shared by the binaries.

use std::any::Any;
use std::panic::{self, PanicHookInfo};
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const DEFAULT_FILTER: &str = "info";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Logging knobs read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogSettings {
    /// Directory for the daily-rotated `<app>.log`; stdout when unset.
    pub dir: Option<PathBuf>,
    /// Chain the default panic hook after logging, which prints the backtrace.
    pub include_backtrace: bool,
}

impl LogSettings {
    pub fn from_env() -> Self {
        let include_backtrace = std::env::var("CM_LOG_INCLUDE_BACKTRACE")
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true"))
            .unwrap_or(false);
        let dir = std::env::var_os("CM_LOG_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        Self {
            dir,
            include_backtrace,
        }
    }
}

fn payload_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn log_panic(app_name: &'static str, info: &PanicHookInfo<'_>) {
    let thread = std::thread::current();
    let location = info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "unknown".to_string());

    tracing::error!(
        application = app_name,
        thread = thread.name().unwrap_or("unnamed"),
        %location,
        panic_message = %payload_text(info.payload()),
        "panic"
    );
}

/// Route panics through `tracing` with thread and location. Later calls are no-ops.
pub fn install_tracing_panic_hook(app_name: &'static str) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let chain_default = LogSettings::from_env().include_backtrace;
        let default_hook = panic::take_hook();

        panic::set_hook(Box::new(move |info| {
            log_panic(app_name, info);
            if chain_default {
                default_hook(info);
            }
        }));
    });
}

fn file_writer(app_name: &'static str, dir: PathBuf) -> Option<BoxMakeWriter> {
    if let Err(err) = std::fs::create_dir_all(&dir) {
        eprintln!("cannot create log dir {}: {err}; using stdout", dir.display());
        return None;
    }

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, format!("{app_name}.log")));
    // Must outlive every log call.
    let _ = FILE_GUARD.set(guard);
    Some(BoxMakeWriter::new(writer))
}

/// Install the global subscriber. `RUST_LOG` filters (default `info`); `CM_LOG_DIR`
/// switches output to a daily-rotated `<dir>/<app>.log`.
pub fn init_tracing_subscriber(app_name: &'static str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match LogSettings::from_env()
        .dir
        .and_then(|dir| file_writer(app_name, dir))
    {
        Some(writer) => subscriber.with_writer(writer).with_ansi(false).try_init(),
        None => subscriber.try_init(),
    };
    if result.is_err() {
        tracing::debug!(application = app_name, "tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn settings_follow_env() {
        let _guard = ENV_GUARD.lock().unwrap();
        unsafe {
            std::env::set_var("CM_LOG_DIR", "/tmp/cm-logs");
            std::env::set_var("CM_LOG_INCLUDE_BACKTRACE", "TRUE");
        }
        let settings = LogSettings::from_env();
        assert_eq!(settings.dir, Some(PathBuf::from("/tmp/cm-logs")));
        assert!(settings.include_backtrace);

        unsafe {
            std::env::set_var("CM_LOG_DIR", "");
            std::env::remove_var("CM_LOG_INCLUDE_BACKTRACE");
        }
        assert_eq!(LogSettings::from_env(), LogSettings::default());
        unsafe { std::env::remove_var("CM_LOG_DIR") };
    }

    #[test]
    fn payload_text_handles_both_string_kinds() {
        assert_eq!(payload_text(&"static"), "static");
        assert_eq!(payload_text(&String::from("owned")), "owned");
        assert_eq!(payload_text(&42_u8), "non-string panic payload");
    }
}
