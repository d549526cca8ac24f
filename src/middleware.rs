// SPDX-License-Identifier: Apache-2.0
use actix_web::{dev::{Service, ServiceRequest, ServiceResponse, Transform}, Error, http::header, HttpResponse};
use actix_web::body::EitherBody;
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, info, info_span};

use crate::gate::{decide, GateConfig, GateDecision};
use crate::session::{request_cookies, SessionState, SESSION_COOKIE, USER_COOKIE};

/// Redirects requests based on session cookie presence before routing.
#[derive(Clone)]
pub struct AccessGate {
    config: Arc<GateConfig>,
}

impl AccessGate {
    pub fn new(config: GateConfig) -> Self {
        AccessGate {
            config: Arc::new(config),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AccessGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AccessGateService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AccessGateService {
            service: Rc::new(service),
            config: Arc::clone(&self.config),
        })
    }
}

pub struct AccessGateService<S> {
    service: Rc<S>,
    config: Arc<GateConfig>,
}

impl<S, B> Service<ServiceRequest> for AccessGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let span = info_span!("access_gate", path = %req.path(), method = %req.method());
        let _entered = span.enter();

        let cookies = request_cookies(req.headers());
        let state = SessionState::from_cookies(
            cookies.get(USER_COOKIE).map(String::as_str),
            cookies.get(SESSION_COOKIE).map(String::as_str),
        );

        let decision = decide(req.path(), state, &self.config);
        let target = match self.config.redirect_target(decision) {
            Some(target) => target.to_owned(),
            None => {
                debug!(?state, "Access gate allows request");
                let fut = self.service.call(req);
                return Box::pin(async move {
                    let res = fut.await?;
                    Ok(res.map_into_left_body())
                });
            }
        };

        match decision {
            GateDecision::RedirectToLogin => {
                info!(path = %req.path(), "Unauthenticated request, redirecting to login");
            }
            _ => debug!(path = %req.path(), "Already logged in, redirecting away from login"),
        }

        let (request, _) = req.into_parts();
        let response = HttpResponse::Found()
            .append_header((header::LOCATION, target))
            .finish();

        Box::pin(async move {
            Ok(ServiceResponse::new(request, response).map_into_right_body())
        })
    }
}
