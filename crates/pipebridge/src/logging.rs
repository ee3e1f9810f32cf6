//! Tracing setup for hosts that embed the bridge.
//!
//! Always writes to stderr: in process-wide mode stdout is the engine's
//! response channel and anything logged there would be read back as engine
//! output.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const ENV_LOG: &str = "PIPEBRIDGE_LOG";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// Directive used when `RUST_LOG` is not set.
fn default_directive(level: Option<&str>) -> String {
    let level = match level {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    };
    format!("pipebridge={level},pipebridge_ffi={level}")
}

/// Install the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` wins when set; otherwise `PIPEBRIDGE_LOG` picks the level for
/// the bridge crates. `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = std::env::var(ENV_LOG).ok();
        EnvFilter::new(default_directive(level.as_deref()))
    };

    let json = std::env::var(ENV_LOG_FORMAT).as_deref() == Ok("json");
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| fmt::layer().with_writer(std::io::stderr));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init();
}
