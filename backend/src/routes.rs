use std::path::{Path, PathBuf};

use actix_files::{Files, NamedFile};
use actix_multipart::Multipart;
use actix_web::dev::{ServiceRequest, ServiceResponse, fn_service};
use actix_web::error::{BlockingError, InternalError, JsonPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use futures::TryStreamExt;
use log::{error, info, warn};
use shared::{
    ChatRequest, ChatResponse, ErrorResponse, HealthResponse, InferenceRequest, InferenceResponse,
    SpeechRequest, SpeechResponse,
};

use crate::chat::chat_service::{ChatError, ChatService};
use crate::inference::InferenceError;
use crate::inference::labels::{display_label, is_healthy_label};
use crate::inference::model::{Model, Prediction};
use crate::speech::tts_service::{DEFAULT_LANGUAGE, SpeechError, SpeechService};
use crate::treatment::treatment_service::TreatmentService;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Payload exceeds {0} bytes")]
    PayloadTooLarge(usize),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Speech(#[from] SpeechError),
    #[error("Inference worker failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::Inference(InferenceError::Decode(_))
            | ApiError::Chat(ChatError::EmptyMessage)
            | ApiError::Speech(SpeechError::EmptyText) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Inference(InferenceError::Classifier(_))
            | ApiError::Blocking(_)
            | ApiError::Chat(ChatError::MissingApiKey)
            | ApiError::Speech(SpeechError::NotConfigured) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Chat(_) | ApiError::Speech(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

/// Upper bound for request bodies, JSON and multipart alike.
#[derive(Clone, Copy, Debug)]
pub struct PayloadLimit(pub usize);

pub fn configure_routes(
    cfg: &mut web::ServiceConfig,
    frontend_dir: Option<PathBuf>,
    max_payload_bytes: usize,
) {
    let json_config = web::JsonConfig::default()
        .limit(max_payload_bytes)
        .error_handler(|err, _req| {
            let status = match &err {
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                _ => StatusCode::BAD_REQUEST,
            };
            let body = ErrorResponse {
                error: err.to_string(),
            };
            InternalError::from_response(err, HttpResponse::build(status).json(body)).into()
        });

    cfg.app_data(json_config)
        .app_data(web::Data::new(PayloadLimit(max_payload_bytes)))
        .service(web::resource("/api/predict").route(web::post().to(predict)))
        .service(web::resource("/api/predict/upload").route(web::post().to(predict_upload)))
        .service(web::resource("/api/chat").route(web::post().to(chat)))
        .service(web::resource("/api/tts").route(web::post().to(synthesize)))
        .service(web::resource("/api/health").route(web::get().to(health)));

    if let Some(dir) = frontend_dir {
        cfg.service(frontend(&dir));
    }
}

/// Static files with an `index.html` fallback for client-side routes.
fn frontend(dir: &Path) -> Files {
    let index = dir.join("index.html");
    Files::new("/", dir)
        .index_file("index.html")
        .default_handler(fn_service(move |req: ServiceRequest| {
            let index = index.clone();
            async move {
                let (req, _) = req.into_parts();
                let file = NamedFile::open_async(index).await?;
                let res = file.into_response(&req);
                Ok(ServiceResponse::new(req, res))
            }
        }))
}

fn prediction_response(prediction: Prediction, treatments: &TreatmentService) -> InferenceResponse {
    info!(
        "Predicted {} ({:.2}%)",
        prediction.label, prediction.confidence
    );
    InferenceResponse {
        disease: display_label(&prediction.label),
        confidence: prediction.confidence,
        is_healthy: is_healthy_label(&prediction.label),
        treatment: treatments.treatment_for(&prediction.label),
    }
}

async fn predict(
    model: web::Data<Model>,
    treatments: web::Data<TreatmentService>,
    body: web::Json<InferenceRequest>,
) -> Result<HttpResponse, ApiError> {
    let image = body
        .into_inner()
        .image
        .ok_or_else(|| ApiError::BadRequest("No image provided".to_string()))?;

    let model = model.into_inner();
    let prediction = web::block(move || model.infer_base64(&image)).await??;

    Ok(HttpResponse::Ok().json(prediction_response(prediction, &treatments)))
}

async fn predict_upload(
    model: web::Data<Model>,
    treatments: web::Data<TreatmentService>,
    limit: web::Data<PayloadLimit>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut image_data = Vec::new();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {}", e)))?
    {
        let mut data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {}", e)))?
        {
            if data.len() + chunk.len() > limit.0 {
                return Err(ApiError::PayloadTooLarge(limit.0));
            }
            data.extend_from_slice(&chunk);
        }
        if !data.is_empty() {
            image_data = data;
            break;
        }
    }

    if image_data.is_empty() {
        return Err(ApiError::BadRequest("No image provided".to_string()));
    }

    let model = model.into_inner();
    let prediction = web::block(move || model.infer_bytes(&image_data)).await??;

    Ok(HttpResponse::Ok().json(prediction_response(prediction, &treatments)))
}

async fn chat(
    chat: web::Data<ChatService>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    let message = body.into_inner().message.unwrap_or_default();
    let response = chat.reply(&message).await?;
    Ok(HttpResponse::Ok().json(ChatResponse {
        response,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

async fn synthesize(
    speech: web::Data<SpeechService>,
    body: web::Json<SpeechRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    let text = request.text.unwrap_or_default();
    let lang = request.lang.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    let audio = speech.synthesize(&text, &lang).await?;
    Ok(HttpResponse::Ok().json(SpeechResponse { audio }))
}

async fn health(model: web::Data<Model>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        message: "Plant Disease Detection API is running".to_string(),
        classifier: model.backend().to_string(),
        classes: model.labels().len(),
    })
}
