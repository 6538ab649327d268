//! Lightweight structured logging for the cloudfs workspace.
//!
//! Logging is off unless the `CLOUDFS_LOG` environment variable selects a
//! level (`error`, `warn`, `info`, `debug`). Events go to stderr via
//! `emit_term`.

use std::sync::Once;

// Re-export emit so the macros below resolve it from the caller's crate.
pub use emit;

// Re-export emit's logging macros under the crate's `log_*` names. Re-exporting
// (rather than wrapping in `macro_rules!`) keeps the call-site spans intact, so
// emit's template interpolation (e.g. `{prefix}`) resolves the caller's locals.
pub use emit::{debug as log_debug, error as log_error, info as log_info, warn as log_warn};

static INIT: Once = Once::new();

/// Initialize diagnostics from `CLOUDFS_LOG`. Safe to call more than once;
/// only the first call does anything.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let level = match std::env::var("CLOUDFS_LOG").ok().as_deref() {
            None | Some("off") | Some("") => return,
            Some("debug") => emit::Level::Debug,
            Some("warn") => emit::Level::Warn,
            Some("error") => emit::Level::Error,
            Some(_) => emit::Level::Info,
        };
        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();
        // The runtime must outlive every caller; the process owns it.
        std::mem::forget(rt);
    });
}

// `log_info`, `log_debug`, `log_warn`, and `log_error` are re-exported from
// `emit` above (see the `pub use` near the top of this module).
