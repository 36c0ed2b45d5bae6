//! The HTTP surface, driven through actix-web's in-process test service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use appointment_queue::web::{routes, AppState, HOSPITAL_HEADER, PATIENT_HEADER};
use appointment_queue::{
    AppointmentCoordinator, MemoryQueueStore, MemoryRecordStore, QueueKey, QueueStore, StoreError,
};
use async_trait::async_trait;

/// In-memory queues whose writes can be switched off.
#[derive(Default)]
struct FailingQueues {
    inner: MemoryQueueStore,
    fail_writes: AtomicBool,
}

impl FailingQueues {
    fn check(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QueueStore for FailingQueues {
    async fn insert(&self, key: &QueueKey, member: u64, score: u64) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.insert(key, member, score).await
    }

    async fn remove(&self, key: &QueueKey, member: u64) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.remove(key, member).await
    }

    async fn rank(&self, key: &QueueKey, member: u64) -> Result<Option<usize>, StoreError> {
        self.inner.rank(key, member).await
    }

    async fn cardinality(&self, key: &QueueKey) -> Result<usize, StoreError> {
        self.inner.cardinality(key).await
    }

    async fn members(&self, key: &QueueKey) -> Result<Vec<u64>, StoreError> {
        self.inner.members(key).await
    }
}

fn state_with(queues: Arc<dyn QueueStore>) -> web::Data<AppState> {
    let coordinator = AppointmentCoordinator::new(Arc::new(MemoryRecordStore::new()), queues);
    web::Data::new(AppState { coordinator })
}

fn state() -> web::Data<AppState> {
    state_with(Arc::new(MemoryQueueStore::new()))
}

async fn body_json(resp: ServiceResponse) -> Value {
    test::read_body_json(resp).await
}

fn register_req(hospital: u64, department: u64) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/departments")
        .insert_header((HOSPITAL_HEADER, hospital.to_string()))
        .set_json(json!({ "departmentId": department }))
}

fn book_req(patient: u64, hospital: u64, department: u64) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/appointments")
        .insert_header((PATIENT_HEADER, patient.to_string()))
        .set_json(json!({
            "hospitalId": hospital,
            "departmentId": department,
            "title": "General consultation",
            "time": "2026-10-22T11:00:00Z",
        }))
}

fn patch_req(id: u64, hospital: u64, status: &str) -> test::TestRequest {
    test::TestRequest::patch()
        .uri(&format!("/appointments/{id}"))
        .insert_header((HOSPITAL_HEADER, hospital.to_string()))
        .set_json(json!({ "status": status }))
}

/// Checks a successful booking response and returns the new appointment id.
async fn booked_id(resp: ServiceResponse) -> u64 {
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["appointment"]["status"], "Pending");
    assert_eq!(body["queued"], true);
    body["appointment"]["id"].as_u64().unwrap()
}

macro_rules! call {
    ($app:expr, $req:expr) => {
        test::call_service(&$app, $req.to_request()).await
    };
}

macro_rules! register {
    ($app:expr, $hospital:expr, $department:expr) => {
        assert_eq!(
            call!($app, register_req($hospital, $department)).status(),
            StatusCode::CREATED
        )
    };
}

macro_rules! book {
    ($app:expr, $patient:expr, $hospital:expr, $department:expr) => {
        booked_id(call!($app, book_req($patient, $hospital, $department))).await
    };
}

#[actix_web::test]
async fn health_check_responds() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::read_body(resp).await, "Server is healthy");
}

#[actix_web::test]
async fn book_confirm_and_query_position() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    register!(app, 1, 10);

    let first = book!(app, 50, 1, 10);
    let second = book!(app, 51, 1, 10);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/appointments/{first}/queue-status"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "status": "Pending" }));

    assert_eq!(call!(app, patch_req(second, 1, "Confirmed")).status(), StatusCode::OK);
    let resp = call!(app, patch_req(first, 1, "Confirmed"));
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "Confirmed");

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/appointments/{second}/queue-status"))
            .to_request(),
    )
    .await;
    assert_eq!(
        body_json(resp).await,
        json!({
            "status": "Confirmed",
            "queue": { "userPosition": 2, "peopleAhead": 1, "totalQueueLength": 2 }
        })
    );

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/departments/10/queues")
            .insert_header((HOSPITAL_HEADER, "1"))
            .to_request(),
    )
    .await;
    let body = body_json(resp).await;
    assert_eq!(body["confirmed"]["members"], json!([first, second]));
    assert_eq!(body["pending"]["length"], 0);
}

#[actix_web::test]
async fn error_statuses_match_the_contract() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    register!(app, 1, 10);
    register!(app, 2, 20);
    let id = book!(app, 50, 1, 10);

    // unknown appointment
    let resp = call!(app, patch_req(9999, 1, "Confirmed"));
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["code"], "APPOINTMENT_NOT_FOUND");

    // another hospital
    let resp = call!(app, patch_req(id, 2, "Confirmed"));
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(resp).await["code"], "FORBIDDEN");

    // bad label, then illegal transition
    let resp = call!(app, patch_req(id, 1, "Lost"));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], "INVALID_STATUS");

    assert_eq!(call!(app, patch_req(id, 1, "Completed")).status(), StatusCode::OK);
    let resp = call!(app, patch_req(id, 1, "Confirmed"));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], "INVALID_TRANSITION");

    // missing caller identity
    let req = test::TestRequest::patch()
        .uri(&format!("/appointments/{id}"))
        .set_json(json!({ "status": "Cancelled" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    // queue status for an unknown appointment
    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/appointments/9999/queue-status").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn booking_rejects_missing_fields_and_bad_pairing() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    register!(app, 1, 10);

    let req = test::TestRequest::post()
        .uri("/appointments")
        .insert_header((PATIENT_HEADER, "5"))
        .set_json(json!({ "hospitalId": 1, "departmentId": 10, "time": "2026-10-22T11:00:00Z" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "MISSING_FIELD");
    assert!(body["error"].as_str().unwrap().contains("title"));

    let req = test::TestRequest::post()
        .uri("/appointments")
        .insert_header((PATIENT_HEADER, "5"))
        .set_json(json!({
            "hospitalId": 3,
            "departmentId": 10,
            "title": "Wrong hospital",
            "time": "2026-10-22T11:00:00Z",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["code"], "DEPARTMENT_NOT_FOUND");

    let req = test::TestRequest::post()
        .uri("/appointments")
        .insert_header((PATIENT_HEADER, "5"))
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], "MALFORMED_BODY");
}

#[actix_web::test]
async fn listings_and_reconcile_routes() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    register!(app, 1, 10);
    let id = book!(app, 50, 1, 10);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/patient/appointments")
            .insert_header((PATIENT_HEADER, "50"))
            .to_request(),
    )
    .await;
    let body = body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], id);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/hospital/appointments")
            .insert_header((HOSPITAL_HEADER, "1"))
            .to_request(),
    )
    .await;
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 1);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/appointments/{id}/reconcile"))
            .insert_header((HOSPITAL_HEADER, "1"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["inserted"], Value::Null);
    assert_eq!(body["removed"], json!([]));

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/departments/10/reconcile")
            .insert_header((HOSPITAL_HEADER, "1"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["evicted"], json!([]));

    // a department already owned by hospital 1 cannot be claimed by hospital 2
    let req = test::TestRequest::post()
        .uri("/departments")
        .insert_header((HOSPITAL_HEADER, "2"))
        .set_json(json!({ "departmentId": 10 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn half_applied_move_surfaces_then_converges_on_retry() {
    let queues = Arc::new(FailingQueues::default());
    let app = test::init_service(App::new().app_data(state_with(queues.clone())).configure(routes)).await;
    register!(app, 1, 10);
    let id = book!(app, 50, 1, 10);

    queues.fail_writes.store(true, Ordering::SeqCst);
    let resp = call!(app, patch_req(id, 1, "Confirmed"));
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(resp).await["code"], "QUEUE_MOVE_FAILED");

    // the record says Confirmed but no confirmed queue entry exists
    let status_req = || test::TestRequest::get().uri(&format!("/appointments/{id}/queue-status"));
    let resp = call!(app, status_req());
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["code"], "QUEUE_ENTRY_MISSING");

    queues.fail_writes.store(false, Ordering::SeqCst);
    let resp = call!(app, patch_req(id, 1, "Confirmed"));
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "Confirmed");

    let resp = call!(app, status_req());
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await["queue"],
        json!({ "userPosition": 1, "peopleAhead": 0, "totalQueueLength": 1 })
    );
}
