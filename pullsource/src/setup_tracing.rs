use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::PanicHookInfo;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, filter::EnvFilter, fmt};

/// Routes panics through `tracing` so they end up in the same (possibly JSON) stream as every
/// other log line, on a single line unless a backtrace was captured.
fn report_panic(panic_info: &PanicHookInfo<'_>) {
    let backtrace = Backtrace::capture();
    let backtrace_captured = backtrace.status() == BacktraceStatus::Captured;
    let payload = match panic_info.payload().downcast_ref::<&str>() {
        Some(s) => Some(*s),
        None => panic_info
            .payload()
            .downcast_ref::<String>()
            .map(String::as_str),
    };

    match (panic_info.location(), payload, backtrace_captured) {
        (Some(location), Some(payload), false) => {
            tracing::error!(
                "{}:{}:{}: {}",
                location.file(),
                location.line(),
                location.column(),
                payload,
            );
        }
        _ => {
            tracing::error!("{}\n{}", panic_info, backtrace);
        }
    };
}

/// Filter used when `RUST_LOG` is unset or invalid.
fn default_filter(debug_mode: bool) -> EnvFilter {
    let directives = if debug_mode {
        "debug,hyper_util=info,h2=info"
    } else {
        "info"
    };
    EnvFilter::builder().parse_lossy(directives)
}

/// Logs go to stderr, stdout carries the delivered records. `RUST_LOG` overrides the level,
/// `PULLSOURCE_DEBUG=true` switches to text output at debug level.
pub fn register() {
    let debug_mode =
        std::env::var("PULLSOURCE_DEBUG").is_ok_and(|v| v.eq_ignore_ascii_case("true"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug_mode));

    let layer = if debug_mode {
        fmt::layer().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .flatten_event(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .init();

    std::panic::set_hook(Box::new(report_panic));
}
