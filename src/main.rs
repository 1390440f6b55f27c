use log::info;
use tour::{app, config::AppConfig};
use tour_core::server::Server;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = AppConfig::from_env()?;
    info!(
        "starting {} {} on {}:{}",
        config.info.title, config.info.version, config.host, config.port
    );

    Server::new(config.host.clone(), config.port)
        .with_config(config.server_config())
        .with_service(app(&config))
        .run()
}
