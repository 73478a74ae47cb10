use actix_web::{web, App, HttpServer};
use log::info;

use moonhalo::api;
use moonhalo::app_state::AppState;
use moonhalo::config::AppConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::load().expect("Failed to load configuration");
    log4rs::init_file(&config.logging.config_file, Default::default())
        .expect("Failed to initialize logging");

    info!(
        "Starting server on {}:{}",
        config.server.host, config.server.port
    );

    let state = AppState::from_config(config.clone())
        .await
        .expect("Failed to initialize application state");
    let data = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(data.clone())
            .configure(api::configure_routes)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .workers(config.server.workers)
    .run()
    .await
}
