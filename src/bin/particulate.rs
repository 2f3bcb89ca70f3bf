use embassy_executor::Spawner;
use log::{error, info};

use envlog::{app, config::Config};

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    app::init_logger();
    info!("=== envlog (particulate only) ===");

    let code = match Box::pin(app::run(&Config::PARTICULATE_ONLY)).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{e:#}");
            1
        }
    };
    std::process::exit(code);
}
