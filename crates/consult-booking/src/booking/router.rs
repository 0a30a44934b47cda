use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{clock_time, AppointmentId, RequestId, SlotId, UserId};
use super::error::{BookingError, ErrorKind};
use super::orchestrator::BookingOrchestrator;
use super::permissions::{Actor, Capability, Role};
use super::repository::{AppointmentStore, RequestStore, SlotStore};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

type Shared<S, R, A> = State<Arc<BookingOrchestrator<S, R, A>>>;

/// Router exposing the booking operations. Callers identify themselves with the
/// `x-user-id` and `x-user-role` headers.
pub fn booking_router<S, R, A>(orchestrator: Arc<BookingOrchestrator<S, R, A>>) -> Router
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/slots",
            get(available_slots_handler::<S, R, A>).post(create_slot_handler::<S, R, A>),
        )
        .route(
            "/api/v1/slots/:slot_id",
            axum::routing::put(update_slot_handler::<S, R, A>),
        )
        .route(
            "/api/v1/slots/:slot_id/cancel",
            post(cancel_slot_handler::<S, R, A>),
        )
        .route(
            "/api/v1/lecturers/:lecturer_id/slots",
            get(lecturer_slots_handler::<S, R, A>),
        )
        .route(
            "/api/v1/requests",
            get(list_requests_handler::<S, R, A>).post(create_request_handler::<S, R, A>),
        )
        .route(
            "/api/v1/requests/:request_id/approve",
            post(approve_request_handler::<S, R, A>),
        )
        .route(
            "/api/v1/requests/:request_id/reject",
            post(reject_request_handler::<S, R, A>),
        )
        .route(
            "/api/v1/requests/:request_id/cancel",
            post(cancel_request_handler::<S, R, A>),
        )
        .route(
            "/api/v1/appointments",
            get(list_appointments_handler::<S, R, A>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/complete",
            post(complete_appointment_handler::<S, R, A>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/cancel",
            post(cancel_appointment_handler::<S, R, A>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/reschedule",
            post(reschedule_appointment_handler::<S, R, A>),
        )
        .route("/api/v1/audit", get(audit_handler::<S, R, A>))
        .with_state(orchestrator)
}

#[derive(Debug, Deserialize)]
pub struct SlotWindowBody {
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    pub lecturer_id: UserId,
    pub slot_id: SlotId,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ReasonBody {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleBody {
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::NotOwner => StatusCode::FORBIDDEN,
            ErrorKind::InvalidState => StatusCode::CONFLICT,
            ErrorKind::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::IntegrityError | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let payload = json!({
            "error": self.to_string(),
            "kind": kind,
        });
        (status, Json(payload)).into_response()
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let (Some(user_id), Some(role)) = (header(USER_ID_HEADER), header(USER_ROLE_HEADER)) else {
        let payload = json!({
            "error": format!("{USER_ID_HEADER} and {USER_ROLE_HEADER} headers are required"),
        });
        return Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response());
    };

    let role: Role = role.parse().map_err(|message: String| {
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
    })?;
    Ok(Actor::new(user_id, role))
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, BookingError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

macro_rules! actor_or_reject {
    ($headers:expr) => {
        match actor_from_headers(&$headers) {
            Ok(actor) => actor,
            Err(response) => return response,
        }
    };
}

pub(crate) async fn available_slots_handler<S, R, A>(State(booking): Shared<S, R, A>) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    respond(StatusCode::OK, booking.list_available())
}

pub(crate) async fn lecturer_slots_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    Path(lecturer_id): Path<String>,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    respond(
        StatusCode::OK,
        booking.slots().list_for_lecturer(&UserId(lecturer_id)),
    )
}

pub(crate) async fn create_slot_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
    Json(body): Json<SlotWindowBody>,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = actor
        .authorize(Capability::PublishSlots)
        .and_then(|lecturer| {
            booking.create_slot(lecturer, body.date, body.start_time, body.end_time)
        });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn update_slot_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
    Path(slot_id): Path<String>,
    Json(body): Json<SlotWindowBody>,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = actor
        .authorize(Capability::PublishSlots)
        .and_then(|lecturer| {
            booking.update_slot(
                &SlotId(slot_id),
                lecturer,
                body.date,
                body.start_time,
                body.end_time,
            )
        });
    respond(StatusCode::OK, result)
}

pub(crate) async fn cancel_slot_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
    Path(slot_id): Path<String>,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = actor
        .authorize(Capability::PublishSlots)
        .and_then(|lecturer| booking.cancel_slot(&SlotId(slot_id), lecturer));
    respond(StatusCode::OK, result)
}

/// Students see their own requests, lecturers the requests for their slots, staff the
/// pending queue.
pub(crate) async fn list_requests_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = match actor.role {
        Role::Student => booking.requests().list_for_student(&actor.user_id),
        Role::Lecturer => booking.requests().all().map(|mut requests| {
            requests.retain(|request| request.lecturer_id == actor.user_id);
            requests
        }),
        Role::Staff => booking.requests().list_pending(),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn create_request_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
    Json(body): Json<CreateRequestBody>,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = actor
        .authorize(Capability::RequestSlots)
        .and_then(|student| {
            booking.create_request(student, &body.lecturer_id, &body.slot_id, &body.reason)
        });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn approve_request_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = actor
        .authorize(Capability::ReviewRequests)
        .and_then(|_| booking.approve_request(&RequestId(request_id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn reject_request_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = actor
        .authorize(Capability::ReviewRequests)
        .and_then(|_| booking.reject_request(&RequestId(request_id), &body.reason));
    respond(StatusCode::OK, result)
}

pub(crate) async fn cancel_request_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = actor
        .authorize(Capability::RequestSlots)
        .and_then(|student| {
            booking.cancel_request(&RequestId(request_id), student, &body.reason)
        });
    respond(StatusCode::OK, result)
}

pub(crate) async fn list_appointments_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let appointments = booking.appointments();
    let result = match actor.role {
        Role::Student => appointments.list_for_student(&actor.user_id),
        Role::Lecturer => appointments.list_for_lecturer(&actor.user_id),
        Role::Staff => appointments.all(),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn complete_appointment_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
    Path(appointment_id): Path<String>,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = actor
        .authorize(Capability::ManageAppointments)
        .and_then(|_| booking.complete_appointment(&AppointmentId(appointment_id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn cancel_appointment_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
    Path(appointment_id): Path<String>,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = actor
        .authorize(Capability::ManageAppointments)
        .and_then(|_| booking.cancel_appointment(&AppointmentId(appointment_id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn reschedule_appointment_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
    Path(appointment_id): Path<String>,
    Json(body): Json<RescheduleBody>,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = actor
        .authorize(Capability::ManageAppointments)
        .and_then(|_| {
            booking.reschedule_appointment(
                &AppointmentId(appointment_id),
                body.date,
                body.start_time,
            )
        });
    respond(StatusCode::OK, result)
}

pub(crate) async fn audit_handler<S, R, A>(
    State(booking): Shared<S, R, A>,
    headers: HeaderMap,
) -> Response
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    let actor = actor_or_reject!(headers);
    let result = actor
        .authorize(Capability::ManageAppointments)
        .and_then(|_| booking.audit());
    respond(StatusCode::OK, result)
}
