// SPDX-License-Identifier: Apache-2.0
//! HTTP surface of the admin gateway.
//!
//! Every handler builds a `RequestSession` from the inbound request and
//! finishes its response through it, so cookie changes made while talking
//! to upstream (login, logout, 401 invalidation) reach the browser.

use actix_files::{Files, NamedFile};
use actix_web::http::header;
use actix_web::{web, Error, HttpRequest, HttpResponse, Responder, ResponseError, Scope};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, Courses, Files as FileResource, Resource, Testimonials};
use crate::auth::{self, Credentials};
use crate::config::AppConfig;
use crate::forwarder::Forwarder;
use crate::session::RequestSession;
use crate::suggest::{CourseTagsInput, TagSuggester, TestimonialTagsInput};
use crate::transport::Transport;

/// Per-worker application state
pub struct AppState<T> {
    pub config: AppConfig,
    pub transport: T,
    pub api: ApiClient<T>,
    pub suggester: TagSuggester<T>,
}

impl<T: Transport + Clone> AppState<T> {
    pub fn new(config: AppConfig, transport: T) -> Self {
        let api = ApiClient::new(Forwarder::new(transport.clone()), config.api_base_url.clone());
        let suggester = TagSuggester::new(transport.clone(), config.suggest_url.clone());
        Self {
            config,
            transport,
            api,
            suggester,
        }
    }
}

impl<T> AppState<T> {
    fn session(&self, req: &HttpRequest) -> RequestSession {
        RequestSession::from_request(req, self.config.cookie_policy())
    }
}

/// Registers every route of the gateway.
pub fn configure<T: Transport + 'static>(cfg: &mut web::ServiceConfig, config: &AppConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)))
        .service(
            web::resource(config.gate.login_path.as_str())
                .route(web::get().to(login_page::<T>))
                .route(web::post().to(login::<T>)),
        )
        .service(web::resource("/logout").route(web::post().to(logout::<T>)))
        .service(web::resource(config.gate.home_path.as_str()).route(web::get().to(dashboard::<T>)))
        .service(
            web::scope("/actions")
                .service(resource_routes::<Courses, T>("/courses"))
                .service(resource_routes::<Testimonials, T>("/testimonials"))
                .service(
                    web::resource("/files")
                        .route(web::get().to(list_items::<FileResource, T>))
                        .route(web::post().to(upload_file::<T>)),
                )
                .service(
                    web::resource("/files/{id}")
                        .route(web::put().to(update_item::<FileResource, T>))
                        .route(web::delete().to(delete_item::<FileResource, T>)),
                )
                .service(web::resource("/suggest-tags/course").route(web::post().to(suggest_course_tags::<T>)))
                .service(web::resource("/suggest-tags/testimonial").route(web::post().to(suggest_testimonial_tags::<T>))),
        )
        .service(Files::new("/static", &config.static_dir));
}

fn resource_routes<R, T>(path: &str) -> Scope
where
    R: Resource + 'static,
    R::Draft: serde::de::DeserializeOwned,
    T: Transport + 'static,
{
    web::scope(path)
        .service(
            web::resource("")
                .route(web::get().to(list_items::<R, T>))
                .route(web::post().to(create_item::<R, T>)),
        )
        .service(
            web::resource("/{id}")
                .route(web::put().to(update_item::<R, T>))
                .route(web::delete().to(delete_item::<R, T>)),
        )
}

/// `{ success: true, data }` or the error's own response
fn envelope<V: Serialize>(result: Result<V, ApiError>) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Ok().json(json!({ "success": true, "data": data })),
        Err(e) => {
            warn!(error = %e, "Admin action failed");
            e.error_response()
        }
    }
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json("admingate is running")
}

async fn login_page<T: 'static>(state: web::Data<AppState<T>>) -> Result<NamedFile, Error> {
    Ok(NamedFile::open_async(state.config.static_dir.join("login.html")).await?)
}

async fn login<T: Transport + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<T>>,
    credentials: web::Json<Credentials>,
) -> HttpResponse {
    let mut session = state.session(&req);
    let result = auth::login(&state.transport, &mut session, &state.config.api_base_url, &credentials).await;

    let response = match result {
        Ok(user) => HttpResponse::Ok().json(json!({ "success": true, "user": user })),
        Err(e) => {
            warn!(error = %e, "Login failed");
            e.error_response()
        }
    };
    session.finish(response)
}

async fn logout<T: 'static>(req: HttpRequest, state: web::Data<AppState<T>>) -> HttpResponse {
    let mut session = state.session(&req);
    auth::logout(&mut session);

    let response = HttpResponse::Found()
        .append_header((header::LOCATION, state.config.gate.login_path.as_str()))
        .finish();
    session.finish(response)
}

async fn dashboard<T: Transport + 'static>(req: HttpRequest, state: web::Data<AppState<T>>) -> HttpResponse {
    let mut session = state.session(&req);
    let result = state.api.dashboard(&mut session).await;
    session.finish(envelope(result))
}

async fn list_items<R, T>(req: HttpRequest, state: web::Data<AppState<T>>) -> HttpResponse
where
    R: Resource + 'static,
    T: Transport + 'static,
{
    let mut session = state.session(&req);
    let result = state.api.list::<R, _>(&mut session).await;
    session.finish(envelope(result))
}

async fn create_item<R, T>(
    req: HttpRequest,
    state: web::Data<AppState<T>>,
    draft: web::Json<R::Draft>,
) -> HttpResponse
where
    R: Resource + 'static,
    R::Draft: serde::de::DeserializeOwned,
    T: Transport + 'static,
{
    let mut session = state.session(&req);
    let result = state.api.create::<R, _>(&mut session, &draft).await;
    if result.is_ok() {
        info!(resource = R::NAME, "Created record");
    }
    session.finish(envelope(result))
}

async fn update_item<R, T>(
    req: HttpRequest,
    state: web::Data<AppState<T>>,
    id: web::Path<String>,
    draft: web::Json<R::Draft>,
) -> HttpResponse
where
    R: Resource + 'static,
    R::Draft: serde::de::DeserializeOwned,
    T: Transport + 'static,
{
    let mut session = state.session(&req);
    let result = state.api.update::<R, _>(&mut session, &id, &draft).await;
    if result.is_ok() {
        info!(resource = R::NAME, id = %id, "Updated record");
    }
    session.finish(envelope(result))
}

async fn delete_item<R, T>(req: HttpRequest, state: web::Data<AppState<T>>, id: web::Path<String>) -> HttpResponse
where
    R: Resource + 'static,
    T: Transport + 'static,
{
    let mut session = state.session(&req);
    let result = state.api.delete::<R, _>(&mut session, &id).await;
    if result.is_ok() {
        info!(resource = R::NAME, id = %id, "Deleted record");
    }
    session.finish(envelope(result))
}

async fn upload_file<T: Transport + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<T>>,
    body: web::Bytes,
) -> HttpResponse {
    let mut session = state.session(&req);
    let content_type = req.headers().get(header::CONTENT_TYPE).cloned();
    let result = state.api.upload_file(&mut session, content_type, body).await;
    session.finish(envelope(result))
}

async fn suggest_course_tags<T: Transport + 'static>(
    state: web::Data<AppState<T>>,
    input: web::Json<CourseTagsInput>,
) -> HttpResponse {
    match state.suggester.course_tags(&input).await {
        Ok(tags) => HttpResponse::Ok().json(json!({ "success": true, "data": { "tags": tags } })),
        Err(e) => {
            warn!(error = %e, "Could not suggest course tags");
            e.error_response()
        }
    }
}

async fn suggest_testimonial_tags<T: Transport + 'static>(
    state: web::Data<AppState<T>>,
    input: web::Json<TestimonialTagsInput>,
) -> HttpResponse {
    match state.suggester.testimonial_tags(&input).await {
        Ok(tags) => HttpResponse::Ok().json(json!({ "success": true, "data": { "suggestedTags": tags } })),
        Err(e) => {
            warn!(error = %e, "Could not suggest testimonial tags");
            e.error_response()
        }
    }
}
