use anyhow::{Result, anyhow};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

pub struct LogConfig {
    pub filter: String,
}

pub struct Logger {
    reload_handle: reload::Handle<EnvFilter, Registry>,
    pinned_by_env: bool,
}

impl Logger {
    /// Installs the global subscriber. `RUST_LOG`, when set, wins over any
    /// filter loaded later from settings.
    pub fn new_bootstrap() -> Self {
        let (filter, pinned_by_env) = match EnvFilter::try_from_default_env() {
            Ok(filter) => (filter, true),
            Err(_) => (EnvFilter::new("info"), false),
        };
        let (filter, reload_handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();

        Self {
            reload_handle,
            pinned_by_env,
        }
    }

    pub fn reload_from_config(&self, config: &LogConfig) -> Result<()> {
        if self.pinned_by_env {
            tracing::debug!("RUST_LOG set, ignoring configured filter");
            return Ok(());
        }
        let filter = EnvFilter::try_new(&config.filter).map_err(|e| anyhow!(e))?;
        self.reload_handle.reload(filter).map_err(|e| anyhow!(e))?;
        Ok(())
    }
}
