use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer, ResponseError};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::LifecycleError;
use crate::lifecycle::{AppointmentCoordinator, BookingRequest};

pub const HOSPITAL_HEADER: &str = "X-Hospital-Id";
pub const PATIENT_HEADER: &str = "X-Patient-Id";

pub struct AppState {
    pub coordinator: AppointmentCoordinator,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or malformed {0} header")]
    Unauthorized(&'static str),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Lifecycle(e) => e.code(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Lifecycle(e) => match e {
                LifecycleError::MissingField(_)
                | LifecycleError::InvalidStatus(_)
                | LifecycleError::IllegalTransition { .. } => StatusCode::BAD_REQUEST,
                LifecycleError::Forbidden { .. } => StatusCode::FORBIDDEN,
                LifecycleError::NotFound(_)
                | LifecycleError::UnknownDepartment { .. }
                | LifecycleError::Inconsistent { .. } => StatusCode::NOT_FOUND,
                LifecycleError::Conflict { .. } | LifecycleError::DepartmentOwned { .. } => {
                    StatusCode::CONFLICT
                }
                LifecycleError::QueueMoveFailed { .. }
                | LifecycleError::Store(_)
                | LifecycleError::Records(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        }))
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

/// Reads a caller id that the upstream gateway has already verified.
fn caller_id(req: &HttpRequest, header: &'static str) -> Result<u64, ApiError> {
    req.headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or(ApiError::Unauthorized(header))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequestBody {
    hospital_id: Option<u64>,
    department_id: Option<u64>,
    title: Option<String>,
    time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Deserialize)]
pub struct StatusUpdateBody {
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentBody {
    department_id: Option<u64>,
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("Server is healthy")
}

// Patient books into a department's pending queue
async fn book_appointment(
    req: HttpRequest,
    body: web::Json<BookRequestBody>,
    state: web::Data<AppState>,
) -> ApiResult {
    let patient_id = caller_id(&req, PATIENT_HEADER)?;
    let body = body.into_inner();
    let booking = state
        .coordinator
        .book_appointment(BookingRequest {
            patient_id: Some(patient_id),
            hospital_id: body.hospital_id,
            department_id: body.department_id,
            title: body.title,
            time: body.time,
        })
        .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Appointment created",
        "appointment": booking.appointment,
        "queued": booking.queued,
    })))
}

// Hospital moves one of its appointments through the lifecycle
async fn update_status(
    req: HttpRequest,
    path: web::Path<u64>,
    body: web::Json<StatusUpdateBody>,
    state: web::Data<AppState>,
) -> ApiResult {
    let hospital_id = caller_id(&req, HOSPITAL_HEADER)?;
    let status = body
        .into_inner()
        .status
        .ok_or(LifecycleError::MissingField("status"))?;
    let updated = state
        .coordinator
        .update_status(path.into_inner(), &status, hospital_id)
        .await?;
    Ok(HttpResponse::Ok().json(updated))
}

async fn queue_status(path: web::Path<u64>, state: web::Data<AppState>) -> ApiResult {
    let status = state.coordinator.check_queue_status(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(status))
}

async fn reconcile_appointment(
    req: HttpRequest,
    path: web::Path<u64>,
    state: web::Data<AppState>,
) -> ApiResult {
    let hospital_id = caller_id(&req, HOSPITAL_HEADER)?;
    let report = state
        .coordinator
        .reconcile_appointment(path.into_inner(), hospital_id)
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

async fn register_department(
    req: HttpRequest,
    body: web::Json<DepartmentBody>,
    state: web::Data<AppState>,
) -> ApiResult {
    let hospital_id = caller_id(&req, HOSPITAL_HEADER)?;
    let department_id = body
        .into_inner()
        .department_id
        .ok_or(LifecycleError::MissingField("departmentId"))?;
    let added = state
        .coordinator
        .register_department(hospital_id, department_id)
        .await?;

    let payload = serde_json::json!({ "hospitalId": hospital_id, "departmentId": department_id });
    if added {
        Ok(HttpResponse::Created().json(payload))
    } else {
        Ok(HttpResponse::Ok().json(payload))
    }
}

async fn department_queues(
    req: HttpRequest,
    path: web::Path<u64>,
    state: web::Data<AppState>,
) -> ApiResult {
    let hospital_id = caller_id(&req, HOSPITAL_HEADER)?;
    let snapshot = state
        .coordinator
        .queue_snapshot(hospital_id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "hospitalId": snapshot.hospital_id,
        "departmentId": snapshot.department_id,
        "pending": { "members": snapshot.pending, "length": snapshot.pending.len() },
        "confirmed": { "members": snapshot.confirmed, "length": snapshot.confirmed.len() },
    })))
}

async fn reconcile_department(
    req: HttpRequest,
    path: web::Path<u64>,
    state: web::Data<AppState>,
) -> ApiResult {
    let hospital_id = caller_id(&req, HOSPITAL_HEADER)?;
    let report = state
        .coordinator
        .reconcile_department(hospital_id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

async fn hospital_appointments(req: HttpRequest, state: web::Data<AppState>) -> ApiResult {
    let hospital_id = caller_id(&req, HOSPITAL_HEADER)?;
    let appointments = state.coordinator.list_hospital_appointments(hospital_id).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

async fn patient_appointments(req: HttpRequest, state: web::Data<AppState>) -> ApiResult {
    let patient_id = caller_id(&req, PATIENT_HEADER)?;
    let appointments = state.coordinator.list_patient_appointments(patient_id).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let body = serde_json::json!({ "error": err.to_string(), "code": "MALFORMED_BODY" });
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    })
}

/// Registers every route; shared by the server and the HTTP tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/", web::get().to(health))
        .route("/appointments", web::post().to(book_appointment))
        .route("/appointments/{id}", web::patch().to(update_status))
        .route("/appointments/{id}/queue-status", web::get().to(queue_status))
        .route("/appointments/{id}/reconcile", web::post().to(reconcile_appointment))
        .route("/departments", web::post().to(register_department))
        .route("/departments/{id}/queues", web::get().to(department_queues))
        .route("/departments/{id}/reconcile", web::post().to(reconcile_department))
        .route("/hospital/appointments", web::get().to(hospital_appointments))
        .route("/patient/appointments", web::get().to(patient_appointments));
}

pub async fn start_server(config: &ServerConfig, coordinator: AppointmentCoordinator) -> std::io::Result<()> {
    let app_state = web::Data::new(AppState { coordinator });

    info!(bind = %config.bind_address, port = config.port, "starting HTTP server");
    let result = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await;

    if let Err(e) = &result {
        error!(error = %e, "HTTP server stopped with error");
    }
    result
}
