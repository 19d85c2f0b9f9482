mod ui;

use std::{env, fs::File, sync::Mutex};

use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The viewer owns the terminal, so logs only go to a file.
    if let Some(path) = env::var_os("CASECYCLE_LOG") {
        let file = File::create(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
    ui::run()
}
