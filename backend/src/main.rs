mod chat;
mod config;
mod inference;
mod routes;
mod speech;
mod treatment;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use chat::chat_service::ChatService;
use config::{AppConfig, ConfigError};
use routes::configure_routes;
use speech::tts_service::SpeechService;
use treatment::treatment_service::TreatmentService;

fn startup_error(e: ConfigError) -> std::io::Error {
    log::error!("Startup failed: {}", e);
    std::io::Error::other(e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(startup_error)?;

    let model =
        inference::build_model(&config.classifier, config.preprocess).map_err(startup_error)?;
    log::info!(
        "Loaded {} classifier ({}) with {} classes",
        model.backend(),
        config.classifier.model_path.display(),
        model.labels().len()
    );

    let table = treatment::load_treatments(&config.classifier).map_err(startup_error)?;
    log::info!("Loaded {} treatment entries", table.len());
    let treatments = TreatmentService::new(table);

    let http_client = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .map_err(|e| startup_error(ConfigError::HttpClient(e.to_string())))?;
    let chat_service = ChatService::new(http_client.clone(), &config.chat);
    let speech_service = SpeechService::new(http_client, &config.speech);
    log::info!("Chat mode: {:?}", chat_service.mode());
    if !speech_service.is_configured() {
        log::warn!("TTS_API_KEY is not set; /api/tts will return errors");
    }

    let frontend_dir = if config.frontend_dir.is_dir() {
        Some(config.frontend_dir.clone())
    } else {
        log::warn!(
            "Frontend directory {} not found; serving the API only",
            config.frontend_dir.display()
        );
        None
    };

    let model = web::Data::new(model);
    let treatments = web::Data::new(treatments);
    let chat_service = web::Data::new(chat_service);
    let speech_service = web::Data::new(speech_service);
    let max_payload_bytes = config.max_payload_bytes;
    let bind_address = config.bind_address();

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(model.clone())
            .app_data(treatments.clone())
            .app_data(chat_service.clone())
            .app_data(speech_service.clone())
            .configure(|cfg| configure_routes(cfg, frontend_dir.clone(), max_payload_bytes))
    })
    .bind(&bind_address)?
    .run()
    .await
}
