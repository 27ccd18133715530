//! HTTP router for the three portals.
//!
//! Routes are grouped per portal: a public sub-router carrying login and
//! signup, and a protected sub-router behind the portal's gate middleware.
//! `/dashboard` and `/logout` accept any valid session.
//!
//! Middleware uses `Extension<ApiContext>` (injected as the outermost
//! layer); endpoint handlers use `State<ApiContext>` via `with_state`.

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::api::endpoints::{admin, auth, dashboard, doctor, patient};
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::app_state::AppState;

pub fn api_router(app: Arc<AppState>) -> Router {
    build_router(ApiContext::new(app))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let patient_public = Router::new()
        .route("/login", post(auth::patient_login))
        .route("/signup", post(auth::patient_signup))
        .with_state(ctx.clone());
    let doctor_public = Router::new()
        .route("/login", post(auth::doctor_login))
        .route("/signup", post(auth::doctor_signup))
        .with_state(ctx.clone());
    let admin_public = Router::new()
        .route("/login", post(auth::admin_login))
        .route("/signup", post(auth::admin_signup))
        .with_state(ctx.clone());

    let patient_routes = Router::new()
        .route("/doctors", get(patient::search_doctors))
        .route(
            "/appointments",
            get(patient::list_appointments).post(patient::book_appointment),
        )
        .route("/appointments/:id", get(patient::get_appointment))
        .route(
            "/appointments/:id/history",
            get(patient::appointment_history),
        )
        .route(
            "/appointments/:id/cancel",
            post(patient::cancel_appointment),
        )
        .route(
            "/appointments/:id/reschedule",
            post(patient::reschedule_appointment),
        )
        .route("/prescriptions", get(patient::list_prescriptions))
        .route("/prescriptions/:id", get(patient::get_prescription))
        .route("/test-results", get(patient::list_test_results))
        .route("/test-results/:id", get(patient::get_test_result))
        .route("/health-tips", get(patient::list_health_tips))
        .route(
            "/health-tips/generate",
            post(patient::generate_health_tips),
        )
        .route("/health-tips/:id/like", post(patient::like_tip))
        .route("/health-tips/:id/bookmark", post(patient::bookmark_tip))
        .route("/medications", get(patient::list_medication_entries))
        .route(
            "/medications/toggle",
            post(patient::toggle_medication_entry),
        )
        .route(
            "/medications/adherence",
            get(patient::medication_adherence),
        )
        .route(
            "/profile",
            get(patient::get_profile).put(patient::update_profile),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(
            middleware::auth::require_patient,
        ));

    let doctor_routes = Router::new()
        .route("/appointments", get(doctor::list_appointments))
        .route("/appointments/:id", get(doctor::get_appointment))
        .route(
            "/appointments/:id/notes",
            post(doctor::set_appointment_notes),
        )
        .route(
            "/appointments/:id/complete",
            post(doctor::complete_appointment),
        )
        .route(
            "/appointments/:id/cancel",
            post(doctor::cancel_appointment),
        )
        .route("/patients", get(doctor::list_patients))
        .route("/patients/:id", get(doctor::get_patient))
        .route(
            "/prescriptions",
            get(doctor::list_prescriptions).post(doctor::create_prescription),
        )
        .route("/prescriptions/:id", get(doctor::get_prescription))
        .route(
            "/prescriptions/:id/status",
            put(doctor::set_prescription_status),
        )
        .route(
            "/test-results",
            get(doctor::list_test_results).post(doctor::create_test_result),
        )
        .route(
            "/test-results/:id/status",
            put(doctor::set_test_result_status),
        )
        .route(
            "/schedule",
            get(doctor::get_schedule).put(doctor::update_schedule),
        )
        .route(
            "/unavailable-dates",
            put(doctor::update_unavailable_dates),
        )
        .route(
            "/profile",
            get(doctor::get_profile).put(doctor::update_profile),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_doctor));

    let admin_routes = Router::new()
        .route("/doctors/pending", get(admin::list_pending_doctors))
        .route("/doctors/:id/verify", post(admin::verify_doctor))
        .route("/doctors", get(admin::list_doctors))
        .route(
            "/doctors/:id",
            get(admin::get_doctor).delete(admin::delete_doctor),
        )
        .route("/patients", get(admin::list_patients))
        .route(
            "/patients/:id",
            get(admin::get_patient).delete(admin::delete_patient),
        )
        .route("/appointments", get(admin::list_appointments))
        .route(
            "/appointments/:id/status",
            put(admin::update_appointment_status),
        )
        .route("/appointments/:id", delete(admin::delete_appointment))
        .route(
            "/health-tips",
            get(admin::list_tips).post(admin::create_tip),
        )
        .route(
            "/health-tips/:id",
            put(admin::update_tip).delete(admin::delete_tip),
        )
        .route("/health-tips/:id/status", put(admin::set_tip_status))
        .route("/reports", get(admin::report))
        .route(
            "/settings",
            get(admin::get_settings).put(admin::put_settings),
        )
        .route("/password", post(admin::change_password))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_admin));

    let shared = Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        .route("/logout", post(auth::logout))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(
            middleware::auth::require_session,
        ));

    Router::new()
        .nest("/patient", patient_public)
        .nest("/patient", patient_routes)
        .nest("/doctor", doctor_public)
        .nest("/doctor", doctor_routes)
        .nest("/admin", admin_public)
        .nest("/admin", admin_routes)
        .merge(shared)
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    use crate::db::open_database;
    use crate::registration;
    use crate::tips::TipsClient;

    fn test_app() -> (Router, Arc<AppState>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("portal.db");
        let mut conn = open_database(&path).unwrap();
        registration::seed_default_admin(&mut conn, "admin@clinic.test", "admin", "admin-pass-1")
            .unwrap();

        let app = Arc::new(AppState::new(
            path,
            TipsClient::new("http://localhost:1", "test-model", 1),
        ));
        (api_router(app.clone()), app, tmp)
    }

    fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::from("{}"),
        };
        builder.body(body).unwrap()
    }

    fn session_cookie_of(response: &axum::http::Response<Body>) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("expected Set-Cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn response_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn patient_signup_body(email: &str, username: &str) -> serde_json::Value {
        serde_json::json!({
            "email": email,
            "username": username,
            "password": "patient-pass-1",
            "first_name": "Asha",
            "last_name": "Rao",
            "phone": "9876543210",
            "date_of_birth": "1990-04-12",
            "gender": "female"
        })
    }

    fn doctor_signup_body(email: &str, username: &str) -> serde_json::Value {
        serde_json::json!({
            "email": email,
            "username": username,
            "password": "doctor-pass-1",
            "first_name": "Meera",
            "last_name": "Iyer",
            "phone": "9123456780",
            "date_of_birth": "1980-01-20",
            "gender": "female",
            "specialization": "Cardiology",
            "license_number": "MCI-443",
            "experience_years": 12,
            "consultation_fee": 800.0
        })
    }

    async fn signup_patient(app: &Router, email: &str, username: &str) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/patient/signup",
                None,
                Some(patient_signup_body(email, username)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        session_cookie_of(&response)
    }

    async fn login(app: &Router, portal: &str, login: &str, password: &str) -> axum::http::Response<Body> {
        app.clone()
            .oneshot(json_request(
                "POST",
                &format!("/{portal}/login"),
                None,
                Some(serde_json::json!({ "login": login, "password": password })),
            ))
            .await
            .unwrap()
    }

    /// Sign up a doctor, verify them through the admin portal, log the
    /// doctor in, and return (doctor_cookie, doctor_profile_id).
    async fn verified_doctor(app: &Router, email: &str, username: &str) -> (String, String) {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/doctor/signup",
                None,
                Some(doctor_signup_body(email, username)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        // Signup does not issue a session for an unverified doctor.
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let doctor_id = response_json(response).await["profile"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let admin_login = login(app, "admin", "admin", "admin-pass-1").await;
        assert_eq!(admin_login.status(), StatusCode::OK);
        let admin_cookie = session_cookie_of(&admin_login);

        let verify = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/admin/doctors/{doctor_id}/verify"),
                Some(&admin_cookie),
                Some(serde_json::json!({ "verified": true })),
            ))
            .await
            .unwrap();
        assert_eq!(verify.status(), StatusCode::OK);

        let doctor_login = login(app, "doctor", username, "doctor-pass-1").await;
        assert_eq!(doctor_login.status(), StatusCode::OK);
        (session_cookie_of(&doctor_login), doctor_id)
    }

    fn booking_body(doctor_id: &str) -> serde_json::Value {
        let date = (Utc::now().date_naive() + Duration::days(7)).to_string();
        serde_json::json!({
            "doctor_id": doctor_id,
            "date": date,
            "time": "10:30",
            "reason": "Recurring chest pain"
        })
    }

    #[tokio::test]
    async fn protected_route_requires_session_with_redirect() {
        let (app, _state, _tmp) = test_app();
        let response = app
            .oneshot(json_request("GET", "/patient/appointments", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
        assert_eq!(json["error"]["redirect"], "/patient/login");
    }

    #[tokio::test]
    async fn patient_signup_logs_in_and_reaches_dashboard() {
        let (app, _state, _tmp) = test_app();
        let cookie = signup_patient(&app, "asha@example.test", "asha").await;

        let response = app
            .oneshot(json_request("GET", "/dashboard", Some(&cookie), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["portal"], "patient");
        assert_eq!(json["display_name"], "Asha Rao");
        assert_eq!(json["stats"]["total_appointments"], 0);
    }

    #[tokio::test]
    async fn wrong_password_is_403() {
        let (app, _state, _tmp) = test_app();
        signup_patient(&app, "asha@example.test", "asha").await;

        let response = login(&app, "patient", "asha", "not-the-password").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn cross_portal_login_redirects_to_owning_portal() {
        let (app, _state, _tmp) = test_app();
        signup_patient(&app, "asha@example.test", "asha").await;

        let response = login(&app, "doctor", "asha", "patient-pass-1").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "WRONG_PORTAL");
        assert_eq!(json["error"]["redirect"], "/patient/login");
    }

    #[tokio::test]
    async fn patient_cookie_rejected_on_doctor_routes() {
        let (app, _state, _tmp) = test_app();
        let cookie = signup_patient(&app, "asha@example.test", "asha").await;

        let response = app
            .oneshot(json_request(
                "GET",
                "/doctor/appointments",
                Some(&cookie),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "WRONG_PORTAL");
        assert_eq!(json["error"]["redirect"], "/doctor/login");
    }

    #[tokio::test]
    async fn unverified_doctor_cannot_log_in() {
        let (app, _state, _tmp) = test_app();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/doctor/signup",
                None,
                Some(doctor_signup_body("meera@example.test", "meera")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = login(&app, "doctor", "meera", "doctor-pass-1").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "DOCTOR_UNVERIFIED");
        assert_eq!(json["error"]["redirect"], "/doctor/login");
    }

    #[tokio::test]
    async fn admin_signup_is_always_refused() {
        let (app, _state, _tmp) = test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/admin/signup",
                None,
                Some(patient_signup_body("mallory@example.test", "mallory")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "ADMIN_SIGNUP_DISABLED");
    }

    #[tokio::test]
    async fn duplicate_signup_is_409() {
        let (app, _state, _tmp) = test_app();
        signup_patient(&app, "asha@example.test", "asha").await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/patient/signup",
                None,
                Some(patient_signup_body("asha@example.test", "asha2")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn booking_flow_with_slot_conflict() {
        let (app, _state, _tmp) = test_app();
        let (_doctor_cookie, doctor_id) =
            verified_doctor(&app, "meera@example.test", "meera").await;
        let asha = signup_patient(&app, "asha@example.test", "asha").await;
        let ravi = signup_patient(&app, "ravi@example.test", "ravi").await;

        // Asha takes the slot.
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/patient/appointments",
                Some(&asha),
                Some(booking_body(&doctor_id)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let appointment = response_json(response).await;
        assert_eq!(appointment["status"], "scheduled");
        assert_eq!(appointment["consultation_fee"], 800.0);

        // Ravi cannot take the same slot.
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/patient/appointments",
                Some(&ravi),
                Some(booking_body(&doctor_id)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        // And Ravi cannot read Asha's appointment.
        let id = appointment["id"].as_str().unwrap();
        let response = app
            .oneshot(json_request(
                "GET",
                &format!("/patient/appointments/{id}"),
                Some(&ravi),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reschedule_frees_the_old_slot() {
        let (app, _state, _tmp) = test_app();
        let (_doctor_cookie, doctor_id) =
            verified_doctor(&app, "meera@example.test", "meera").await;
        let asha = signup_patient(&app, "asha@example.test", "asha").await;
        let ravi = signup_patient(&app, "ravi@example.test", "ravi").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/patient/appointments",
                Some(&asha),
                Some(booking_body(&doctor_id)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = response_json(response).await["id"].as_str().unwrap().to_string();

        let new_date = (Utc::now().date_naive() + Duration::days(8)).to_string();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/patient/appointments/{id}/reschedule"),
                Some(&asha),
                Some(serde_json::json!({
                    "date": new_date,
                    "time": "11:00",
                    "reason": "work trip"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The original slot is free again.
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/patient/appointments",
                Some(&ravi),
                Some(booking_body(&doctor_id)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // History recorded the move.
        let response = app
            .oneshot(json_request(
                "GET",
                &format!("/patient/appointments/{id}/history"),
                Some(&asha),
                None,
            ))
            .await
            .unwrap();
        let history = response_json(response).await;
        let events: Vec<&str> = history
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["event"].as_str().unwrap())
            .collect();
        assert_eq!(events, vec!["booked", "rescheduled"]);
        assert_eq!(history[1]["detail"], "work trip");
    }

    #[tokio::test]
    async fn cancellation_is_visible_to_the_doctor() {
        let (app, _state, _tmp) = test_app();
        let (doctor_cookie, doctor_id) =
            verified_doctor(&app, "meera@example.test", "meera").await;
        let asha = signup_patient(&app, "asha@example.test", "asha").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/patient/appointments",
                Some(&asha),
                Some(booking_body(&doctor_id)),
            ))
            .await
            .unwrap();
        let id = response_json(response).await["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/patient/appointments/{id}/cancel"),
                Some(&asha),
                Some(serde_json::json!({ "reason": "travelling that week" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cancelled = response_json(response).await;
        assert_eq!(cancelled["status"], "cancelled");
        assert_eq!(cancelled["cancelled_by"], "patient");

        let response = app
            .oneshot(json_request(
                "GET",
                "/doctor/appointments",
                Some(&doctor_cookie),
                None,
            ))
            .await
            .unwrap();
        let list = response_json(response).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["status"], "cancelled");
    }

    #[tokio::test]
    async fn withdrawing_verification_revokes_the_live_session() {
        let (app, _state, _tmp) = test_app();
        let (doctor_cookie, doctor_id) =
            verified_doctor(&app, "meera@example.test", "meera").await;

        let admin_login = login(&app, "admin", "admin", "admin-pass-1").await;
        let admin_cookie = session_cookie_of(&admin_login);
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/admin/doctors/{doctor_id}/verify"),
                Some(&admin_cookie),
                Some(serde_json::json!({ "verified": false })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The doctor's previously valid cookie no longer works.
        let response = app
            .oneshot(json_request(
                "GET",
                "/doctor/appointments",
                Some(&doctor_cookie),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_invalidates_the_cookie() {
        let (app, _state, _tmp) = test_app();
        let cookie = signup_patient(&app, "asha@example.test", "asha").await;

        let response = app
            .clone()
            .oneshot(json_request("POST", "/logout", Some(&cookie), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie_of(&response).ends_with("sid="));

        let response = app
            .oneshot(json_request("GET", "/dashboard", Some(&cookie), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn doctor_records_reach_the_patient() {
        let (app, _state, _tmp) = test_app();
        let (doctor_cookie, doctor_id) =
            verified_doctor(&app, "meera@example.test", "meera").await;
        let asha = signup_patient(&app, "asha@example.test", "asha").await;

        // An appointment establishes the treating relationship.
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/patient/appointments",
                Some(&asha),
                Some(booking_body(&doctor_id)),
            ))
            .await
            .unwrap();
        let patient_id = response_json(response).await["patient_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/doctor/prescriptions",
                Some(&doctor_cookie),
                Some(serde_json::json!({
                    "patient_id": patient_id,
                    "diagnosis": "Stable angina",
                    "medications": [{
                        "name": "Atenolol",
                        "dosage": "50mg",
                        "frequency": "once daily",
                        "duration": "30 days"
                    }]
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(json_request(
                "GET",
                "/patient/prescriptions",
                Some(&asha),
                None,
            ))
            .await
            .unwrap();
        let list = response_json(response).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["diagnosis"], "Stable angina");
    }

    #[tokio::test]
    async fn admin_report_counts_the_platform() {
        let (app, _state, _tmp) = test_app();
        let (_doctor_cookie, doctor_id) =
            verified_doctor(&app, "meera@example.test", "meera").await;
        let asha = signup_patient(&app, "asha@example.test", "asha").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/patient/appointments",
                Some(&asha),
                Some(booking_body(&doctor_id)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let admin_login = login(&app, "admin", "admin", "admin-pass-1").await;
        let admin_cookie = session_cookie_of(&admin_login);
        let response = app
            .oneshot(json_request("GET", "/admin/reports", Some(&admin_cookie), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report = response_json(response).await;
        assert_eq!(report["counts"]["patients"], 1);
        assert_eq!(report["counts"]["doctors"], 1);
        assert_eq!(report["counts"]["verified_doctors"], 1);
        assert_eq!(report["counts"]["appointments"], 1);
    }

    #[tokio::test]
    async fn tips_generation_fails_soft_when_provider_is_down() {
        let (app, _state, _tmp) = test_app();
        signup_patient(&app, "asha@example.test", "asha").await;
        let cookie = session_cookie_of(&login(&app, "patient", "asha", "patient-pass-1").await);

        // The test client points at a closed port.
        let response = app
            .oneshot(json_request(
                "POST",
                "/patient/health-tips/generate",
                Some(&cookie),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "TIPS_UNAVAILABLE");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (app, _state, _tmp) = test_app();
        let response = app
            .oneshot(json_request("GET", "/nonexistent", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
