use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialise logging. The default level is `info`; `debug` level can be
/// explicitly enabled via the settings file, in which case `RUST_LOG` may
/// override it. When `log_file` is set, output is also appended to that file.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    let (dispatch, guard) = dispatch(debug, log_file.as_deref());
    if tracing::dispatcher::set_global_default(dispatch).is_err() {
        return;
    }
    if let Some(guard) = guard {
        let _ = LOG_GUARD.set(guard);
    }
}

/// Build the subscriber `init` would install, without installing it.
///
/// The returned guard flushes the file writer when dropped.
pub fn dispatch(debug: bool, log_file: Option<&Path>) -> (Dispatch, Option<WorkerGuard>) {
    // When debug logging is disabled we force `info` level regardless of the
    // `RUST_LOG` environment variable.
    let level = if debug { "debug" } else { "info" };
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file.and_then(file_writer) {
        Some((writer, guard)) => {
            let subscriber = builder
                .with_ansi(false)
                .with_writer(std::io::stderr.and(writer))
                .finish();
            (Dispatch::new(subscriber), Some(guard))
        }
        None => (Dispatch::new(builder.finish()), None),
    }
}

fn file_writer(
    path: &Path,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let file_name = path.file_name()?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("failed to create log directory {}: {e}", dir.display());
        return None;
    }
    let appender = tracing_appender::rolling::never(dir, file_name);
    Some(tracing_appender::non_blocking(appender))
}
