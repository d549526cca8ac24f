// SPDX-License-Identifier: Apache-2.0
mod common;

use actix_web::cookie::time::Duration;
use actix_web::cookie::Cookie;
use actix_web::http::header::{self, HeaderValue};
use actix_web::http::{Method, StatusCode};
use actix_web::dev::ServiceResponse;
use actix_web::{test, web, App};
use admingate::auth::decode_user_marker;
use admingate::config::AppConfig;
use admingate::handlers::{configure, AppState};
use admingate::middleware::AccessGate;
use admingate::session::{SESSION_COOKIE, USER_COOKIE};
use admingate::transport::UpstreamResponse;
use common::MockTransport;
use serde_json::{json, Value};

const UPSTREAM: &str = "http://upstream.test";

fn config() -> AppConfig {
    AppConfig {
        api_base_url: UPSTREAM.to_string(),
        ..AppConfig::default()
    }
}

macro_rules! admin_app {
    ($transport:expr, $config:expr) => {{
        let config = $config;
        let state = web::Data::new(AppState::new(config.clone(), $transport.clone()));
        test::init_service(
            App::new()
                .wrap(AccessGate::new(config.gate.clone()))
                .app_data(state)
                .configure(|cfg| configure::<MockTransport>(cfg, &config)),
        )
        .await
    }};
}

fn logged_in(req: test::TestRequest) -> test::TestRequest {
    req.cookie(Cookie::new(USER_COOKIE, r#"{"id":"u1"}"#))
        .cookie(Cookie::new(SESSION_COOKIE, "abc"))
}

// Set-Cookie headers parsed as written, without percent-decoding
fn issued_cookies<B>(resp: &ServiceResponse<B>) -> Vec<Cookie<'static>> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v.to_owned()).ok())
        .collect()
}

fn course_record(id: &str, featured: bool) -> Value {
    json!({
        "_id": id,
        "title": "Advanced JavaScript",
        "path": "advanced-javascript",
        "description": "Closures, prototypes, async/await.",
        "shortDescription": "Become a JavaScript expert.",
        "instructor": "Jane Doe",
        "duration": "3 months",
        "level": "Advanced",
        "price": 4000,
        "category": "Web Development",
        "enrollLink": "https://example.com/enroll-js",
        "tags": ["JavaScript"],
        "image": "https://placehold.co/600x400",
        "requirements": [],
        "whatYouWillLearn": [],
        "isFeatured": featured,
        "isActive": true
    })
}

#[actix_web::test]
async fn test_login_sets_both_cookies_from_set_cookie_header() {
    let transport = MockTransport::new();
    transport.reply(
        UpstreamResponse::new(StatusCode::OK, json!({"success": true, "user": {"id": "u1", "email": "admin@example.com"}}).to_string())
            .with_header(header::SET_COOKIE, HeaderValue::from_static("connect.sid=s.abc123.sig; Path=/; HttpOnly")),
    );
    let app = admin_app!(transport, config());

    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({"email": "admin@example.com", "password": "secret"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookies = issued_cookies(&resp);
    let session = cookies.iter().find(|c| c.name() == SESSION_COOKIE).expect("session cookie");
    assert_eq!(session.value(), "s.abc123.sig");
    assert_eq!(session.http_only(), Some(true));
    assert_eq!(session.path(), Some("/"));
    let user = cookies.iter().find(|c| c.name() == USER_COOKIE).expect("user cookie");
    let user = decode_user_marker(user.value()).expect("profile");
    assert_eq!(user["id"], "u1");

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::POST);
    assert_eq!(calls[0].url, format!("{UPSTREAM}/api/auth/login"));
    assert!(calls[0].headers.get(header::COOKIE).is_none());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "admin@example.com");
}

#[actix_web::test]
async fn test_login_falls_back_to_session_id_in_body() {
    let transport = MockTransport::new();
    transport.reply_json(StatusCode::OK, json!({"success": true, "user": {"id": "u1"}, "sessionId": "sid-from-body"}));
    let app = admin_app!(transport, config());

    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({"email": "admin@example.com"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let session = resp.response().cookies().find(|c| c.name() == SESSION_COOKIE).map(|c| c.value().to_string());
    assert_eq!(session.as_deref(), Some("sid-from-body"));
}

#[actix_web::test]
async fn test_login_rejection_sets_no_cookies() {
    let transport = MockTransport::new();
    transport.reply_json(StatusCode::UNAUTHORIZED, json!({"success": false, "message": "Invalid credentials"}));
    transport.reply_json(StatusCode::OK, json!({"success": true, "user": {"id": "u1"}}));
    let app = admin_app!(transport, config());

    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({"email": "admin@example.com", "password": "wrong"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.response().cookies().count(), 0);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"success": false, "message": "Invalid credentials"}));

    // Accepted but no session issued anywhere
    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({"email": "admin@example.com", "password": "secret"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.response().cookies().count(), 0);
}

#[actix_web::test]
async fn test_profile_with_separators_survives_the_round_trip() {
    let transport = MockTransport::new();
    transport.reply(
        UpstreamResponse::new(
            StatusCode::OK,
            json!({"success": true, "user": {"id": "u1", "name": "Jane Doe; admin", "title": "x; Max-Age=0"}}).to_string(),
        )
        .with_header(header::SET_COOKIE, HeaderValue::from_static("connect.sid=s%3Aabc.x%2Fy%2Bz; Path=/; HttpOnly")),
    );
    let app = admin_app!(transport, config());

    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({"email": "admin@example.com", "password": "secret"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookies = issued_cookies(&resp);
    assert_eq!(cookies.len(), 2);
    for cookie in &cookies {
        assert!(cookie.max_age().is_none(), "{} must not carry injected attributes", cookie.name());
        assert!(cookie.expires_datetime().is_some());
    }
    let user = cookies.iter().find(|c| c.name() == USER_COOKIE).expect("user cookie");
    assert_eq!(decode_user_marker(user.value()).unwrap()["name"], "Jane Doe; admin");
    let session = cookies.iter().find(|c| c.name() == SESSION_COOKIE).expect("session cookie");
    assert_eq!(session.value(), "s%3Aabc.x%2Fy%2Bz");

    // The browser sends back exactly what it was given
    let cookie_header = cookies
        .iter()
        .map(|c| format!("{}={}", c.name(), c.value()))
        .collect::<Vec<_>>()
        .join("; ");
    let req = test::TestRequest::get()
        .uri("/actions/courses")
        .insert_header((header::COOKIE, cookie_header))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].headers.get(header::COOKIE).unwrap(), "connect.sid=s%3Aabc.x%2Fy%2Bz");
}

#[actix_web::test]
async fn test_login_without_user_profile_fails() {
    let transport = MockTransport::new();
    transport.reply_json(StatusCode::OK, json!({"success": true, "sessionId": "sid-from-body"}));
    transport.reply_json(StatusCode::OK, json!({"success": true, "user": null, "sessionId": "sid-from-body"}));
    let app = admin_app!(transport, config());

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(json!({"email": "admin@example.com", "password": "secret"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(issued_cookies(&resp).is_empty());
    }
}

#[actix_web::test]
async fn test_unsafe_session_id_is_not_issued() {
    let transport = MockTransport::new();
    transport.reply_json(StatusCode::OK, json!({"success": true, "user": {"id": "u1"}, "sessionId": "abc; Max-Age=0"}));
    let app = admin_app!(transport, config());

    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({"email": "admin@example.com", "password": "secret"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(issued_cookies(&resp).is_empty());
}

#[actix_web::test]
async fn test_encoded_session_token_is_forwarded_verbatim() {
    let transport = MockTransport::new();
    let app = admin_app!(transport, config());

    let req = test::TestRequest::get()
        .uri("/actions/courses")
        .insert_header((header::COOKIE, r#"user={"id":"u1"}; connect.sid=s%3Aabc.x%2Fy%2Bz"#))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].headers.get(header::COOKIE).unwrap(), "connect.sid=s%3Aabc.x%2Fy%2Bz");
}

#[actix_web::test]
async fn test_logout_removes_both_cookies() {
    let transport = MockTransport::new();
    let app = admin_app!(transport, config());

    let resp = test::call_service(&app, logged_in(test::TestRequest::post().uri("/logout")).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");

    let removed: Vec<String> = resp
        .response()
        .cookies()
        .filter(|c| c.max_age() == Some(Duration::ZERO))
        .map(|c| c.name().to_string())
        .collect();
    assert!(removed.contains(&SESSION_COOKIE.to_string()));
    assert!(removed.contains(&USER_COOKIE.to_string()));
    assert_eq!(transport.call_count(), 0);
}

#[actix_web::test]
async fn test_list_courses_forwards_session_and_maps_ids() {
    let transport = MockTransport::new();
    transport.reply_json(StatusCode::OK, json!({"success": true, "data": [course_record("c1", true)]}));
    let app = admin_app!(transport, config());

    let resp = test::call_service(&app, logged_in(test::TestRequest::get().uri("/actions/courses")).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let calls = transport.calls();
    assert_eq!(calls[0].url, format!("{UPSTREAM}/api/courses"));
    assert_eq!(calls[0].headers.get(header::COOKIE).unwrap(), "connect.sid=abc");

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["id"], "c1");
    assert_eq!(body["data"][0]["level"], "Advanced");
    assert!(body["data"][0].get("_id").is_none());
}

#[actix_web::test]
async fn test_upstream_401_expires_browser_session() {
    let transport = MockTransport::new();
    transport.reply_json(StatusCode::UNAUTHORIZED, json!({"success": false, "message": "Not authenticated"}));
    let app = admin_app!(transport, config());

    let resp = test::call_service(&app, logged_in(test::TestRequest::get().uri("/actions/testimonials")).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let cookies: Vec<_> = resp.response().cookies().map(|c| c.into_owned()).collect();
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name(), SESSION_COOKIE);
    assert_eq!(cookies[0].max_age(), Some(Duration::ZERO));

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Session expired or invalid. Please login again.");
}

#[actix_web::test]
async fn test_anonymous_action_is_redirected_before_upstream() {
    let transport = MockTransport::new();
    let app = admin_app!(transport, config());

    let resp = test::call_service(&app, test::TestRequest::get().uri("/actions/courses").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");
    assert_eq!(transport.call_count(), 0);
}

#[actix_web::test]
async fn test_create_testimonial_posts_draft() {
    let transport = MockTransport::new();
    transport.reply_json(
        StatusCode::OK,
        json!({"success": true, "data": {
            "_id": "t9", "name": "Emily Stone", "designation": "UX Designer",
            "company": "DesignHub", "message": "Top-notch.", "rating": 4,
            "image": "https://placehold.co/100x100", "isActive": true
        }}),
    );
    let app = admin_app!(transport, config());

    let draft = json!({
        "name": "Emily Stone", "designation": "UX Designer", "company": "DesignHub",
        "message": "Top-notch.", "rating": 4, "image": "https://placehold.co/100x100"
    });
    let req = logged_in(test::TestRequest::post().uri("/actions/testimonials")).set_json(&draft).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let calls = transport.calls();
    assert_eq!(calls[0].method, Method::POST);
    assert_eq!(calls[0].url, format!("{UPSTREAM}/api/testimonials"));
    let sent: Value = serde_json::from_slice(calls[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(sent, draft);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["id"], "t9");
}

#[actix_web::test]
async fn test_update_and_delete_target_record_urls() {
    let transport = MockTransport::new();
    transport.reply_json(
        StatusCode::OK,
        json!({"success": true, "data": {
            "_id": "f-1.pdf", "filename": "f-1.pdf", "originalName": "notes.pdf",
            "publicUrl": "/uploads/f-1.pdf", "size": 10, "mimetype": "application/pdf",
            "category": "notes", "description": "Week 1", "isPublic": true,
            "tags": ["week1"], "createdAt": "2025-07-01T00:00:00.000Z", "downloadCount": 3
        }}),
    );
    transport.reply_json(StatusCode::OK, json!({"success": true}));
    let app = admin_app!(transport, config());

    let update = json!({"category": "notes", "description": "Week 1", "isPublic": true, "tags": ["week1"]});
    let req = logged_in(test::TestRequest::put().uri("/actions/files/f-1.pdf")).set_json(&update).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["downloadUrl"], "/uploads/f-1.pdf");

    let req = logged_in(test::TestRequest::delete().uri("/actions/files/f-1.pdf")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let calls = transport.calls();
    assert_eq!(calls[0].method, Method::PUT);
    assert_eq!(calls[0].url, format!("{UPSTREAM}/api/files/f-1.pdf"));
    assert_eq!(calls[1].method, Method::DELETE);
    assert_eq!(calls[1].url, format!("{UPSTREAM}/api/files/f-1.pdf"));
}

#[actix_web::test]
async fn test_upstream_error_message_is_surfaced() {
    let transport = MockTransport::new();
    transport.reply_json(StatusCode::NOT_FOUND, json!({"success": false, "message": "Course not found"}));
    let app = admin_app!(transport, config());

    let req = logged_in(test::TestRequest::delete().uri("/actions/courses/missing")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.response().cookies().count(), 0);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"success": false, "message": "Course not found"}));
}

#[actix_web::test]
async fn test_file_upload_forwards_raw_multipart() {
    let transport = MockTransport::new();
    transport.reply_json(
        StatusCode::OK,
        json!({"success": true, "data": {
            "_id": "u1-a.txt", "filename": "u1-a.txt", "originalName": "a.txt",
            "publicUrl": "/uploads/u1-a.txt", "size": 5, "mimetype": "text/plain"
        }}),
    );
    let app = admin_app!(transport, config());

    let multipart = "--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\r\nhello\r\n--XYZ--\r\n";
    let req = logged_in(test::TestRequest::post().uri("/actions/files"))
        .insert_header((header::CONTENT_TYPE, "multipart/form-data; boundary=XYZ"))
        .set_payload(multipart)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let calls = transport.calls();
    assert_eq!(calls[0].url, format!("{UPSTREAM}/api/files"));
    assert_eq!(calls[0].headers.get(header::CONTENT_TYPE).unwrap(), "multipart/form-data; boundary=XYZ");
    assert_eq!(calls[0].body.as_deref(), Some(multipart.as_bytes()));
}

#[actix_web::test]
async fn test_invalid_record_id_is_rejected_locally() {
    let transport = MockTransport::new();
    let app = admin_app!(transport, config());

    let req = logged_in(test::TestRequest::delete().uri("/actions/courses/bad%3Fid")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(transport.call_count(), 0);
}

#[actix_web::test]
async fn test_dashboard_counts_collections() {
    let transport = MockTransport::new();
    transport.reply_json(StatusCode::OK, json!({"success": true, "data": [course_record("c1", true), course_record("c2", false)]}));
    transport.reply_json(StatusCode::INTERNAL_SERVER_ERROR, json!({"success": false}));
    transport.reply_json(StatusCode::OK, json!({"success": true, "data": []}));
    let app = admin_app!(transport, config());

    let resp = test::call_service(&app, logged_in(test::TestRequest::get().uri("/")).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"], json!({"courses": 2, "featuredCourses": 1, "testimonials": 0, "files": 0}));
    assert_eq!(transport.call_count(), 3);
}

#[actix_web::test]
async fn test_dashboard_stops_when_session_expires() {
    let transport = MockTransport::new();
    transport.reply_json(StatusCode::UNAUTHORIZED, json!({"success": false}));
    let app = admin_app!(transport, config());

    let resp = test::call_service(&app, logged_in(test::TestRequest::get().uri("/")).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(transport.call_count(), 1);
}

#[actix_web::test]
async fn test_tag_suggestions() {
    let transport = MockTransport::new();
    let app = admin_app!(transport, config());

    let req = logged_in(test::TestRequest::post().uri("/actions/suggest-tags/course"))
        .set_json(json!({"description": "Learn Rust"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(transport.call_count(), 0);

    let transport = MockTransport::new();
    transport.reply_json(StatusCode::OK, json!({"result": {"suggestedTags": ["Career", " career ", "Mentorship"]}}));
    let app = admin_app!(transport, AppConfig {
        suggest_url: Some("http://flows.test/".into()),
        ..config()
    });

    let req = logged_in(test::TestRequest::post().uri("/actions/suggest-tags/testimonial"))
        .set_json(json!({"testimonialText": "Great mentors, landed a new job."}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let calls = transport.calls();
    assert_eq!(calls[0].url, "http://flows.test/suggestTagsForTestimonialFlow");
    let sent: Value = serde_json::from_slice(calls[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(sent, json!({"data": {"testimonialText": "Great mentors, landed a new job."}}));
    // Flows are not part of the upstream session
    assert!(calls[0].headers.get(header::COOKIE).is_none());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["suggestedTags"], json!(["Career", "Mentorship"]));
}
