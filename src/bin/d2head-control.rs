use std::process;
use log::{error, info};

use d2head_control::error::{AppRunError, ConfigError};
use d2head_control::{init_logging, run};

#[tokio::main]
async fn main() {
    init_logging();
    info!(concat!("d2head-control ", env!("CARGO_PKG_VERSION")));

    match run().await {
        Err(AppRunError::Config { source: ConfigError::CanNotLock { .. } }) => {
            eprintln!("This application has already been started");
            process::exit(1);
        },
        Err(err) => {
            error!("{}", err);
            eprintln!("d2head-control: {}", err);
            process::exit(1);
        },
        Ok(()) => {},
    }
}
