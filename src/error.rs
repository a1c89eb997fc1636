use std::io::{Write, stderr};
use std::panic;

use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PGSCRIBE_LOG";

pub fn install_hooks() -> Result<()> {
    let hook_builder = color_eyre::config::HookBuilder::default().display_env_section(false);
    let (panic_hook, eyre_hook) = hook_builder.into_hooks();
    eyre_hook.install()?;

    panic::set_hook(Box::new(move |panic_info| {
        let _ = writeln!(stderr(), "{}", panic_hook.panic_report(panic_info));
    }));

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable. `PGSCRIBE_LOG` takes
/// an `EnvFilter` directive; the default is `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(stderr)
        .init();
}
