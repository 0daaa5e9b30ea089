//! Anonymous session identity.
//!
//! Every client gets a random `sessionToken` cookie the first time it shows
//! up without one. Flags use the token as the user id for their decisions.
//!
//! The middleware never blocks a request. If the `Cookie` header can't be
//! read or the new cookie can't be encoded, the request goes through without
//! a cookie and the failure is logged at `debug`.

use cookie::time::Duration;
use cookie::{Cookie, SameSite};
use http::header::{self, HeaderValue};
use tracing::debug;
use uuid::Uuid;

use super::{Middleware, Next};
use crate::config::{Config, Environment};
use crate::handler::BoxFuture;
use crate::request::Request;

pub const SESSION_COOKIE_NAME: &str = "sessionToken";

/// 30 days.
pub const SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 30;

/// Issues the session cookie to clients that don't have one.
#[derive(Clone, Copy, Debug)]
pub struct SessionIdentity {
    secure: bool,
}

impl SessionIdentity {
    /// `Secure` is set on the cookie only in production.
    pub fn new(environment: Environment) -> Self {
        Self { secure: environment.is_production() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.environment)
    }

    /// The `Set-Cookie` value to attach, or `None` to pass through untouched.
    fn issue(&self, req: &Request) -> Option<HeaderValue> {
        match req.cookie(SESSION_COOKIE_NAME) {
            Ok(Some(_)) => return None,
            Ok(None) => {}
            Err(e) => {
                debug!(error = %e, "session cookie inspection failed, passing through");
                return None;
            }
        }

        let cookie = session_cookie(Uuid::new_v4().to_string(), self.secure);
        match HeaderValue::try_from(cookie.to_string()) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(error = %e, "session cookie not encodable, passing through");
                None
            }
        }
    }
}

impl Middleware for SessionIdentity {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let issued = self.issue(&req);
        Box::pin(async move {
            let mut res = next.run(req).await;
            if let Some(value) = issued {
                res.append_header(header::SET_COOKIE, value);
            }
            res
        })
    }
}

/// Returns the caller's session token, if it presented a readable one.
pub fn session_id(req: &Request) -> Option<String> {
    req.cookie(SESSION_COOKIE_NAME).ok().flatten()
}

fn session_cookie(id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, id))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::seconds(SESSION_MAX_AGE_SECS))
        .build()
}
