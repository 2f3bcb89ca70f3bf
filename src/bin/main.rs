use embassy_executor::Spawner;
use log::{error, info};

use envlog::{app, config::Config};

// PMS5003 + BME280 with the ST7735 panel. See `envlog-pm` for the
// particulate-only build.
const CONFIG: Config = Config::DUAL_SENSOR;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    app::init_logger();
    info!("=== envlog ===");

    // The executor never returns on its own, so exit explicitly once the
    // loop has stopped and the log is closed.
    let code = match Box::pin(app::run(&CONFIG)).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{e:#}");
            1
        }
    };
    std::process::exit(code);
}
