//! Role-based access control.
//!
//! Roles form the ordered hierarchy `User < Editor < Admin`. A [`RoleGate`]
//! lists the roles that satisfy a permission and admits any caller whose role
//! is at or above the lowest of them.
//!
//! Rejections come in two shapes. Clients whose `Accept` header prefers HTML
//! are redirected with `303 See Other`, either to `/login` or back to the
//! referring page, carrying an `error` query parameter. Everything else gets
//! a JSON error with 401 or 403.

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, StatusCode,
        header::{ACCEPT, HOST, LOCATION, REFERER},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use entities::Role;
use url::{Url, form_urlencoded};

use crate::error::ServerError;
use crate::middleware::{PendingSecondFactor, Principal};

/// Path of the sign-in page unauthenticated browsers are sent to.
pub const LOGIN_PATH: &str = "/login";

/// The roles allowed through a group of routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGate {
    allowed: Vec<Role>,
}

impl RoleGate {
    /// Creates a gate satisfied by any of `allowed` (or anything above them).
    pub fn new(allowed: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Creates a gate satisfied by `role` and every role above it.
    pub fn at_least(role: Role) -> Self {
        Self::new([role])
    }

    /// Returns the lowest role the gate admits. An empty gate admits nobody.
    pub fn threshold(&self) -> Option<Role> {
        self.allowed.iter().copied().min()
    }

    /// Returns true if `role` satisfies the gate.
    pub fn permits(&self, role: Role) -> bool {
        self.threshold().is_some_and(|threshold| role >= threshold)
    }

    /// Checks the caller against the gate.
    pub fn check(&self, principal: Option<&Principal>) -> Result<(), ServerError> {
        let Some(principal) = principal else {
            return Err(ServerError::AuthenticationRequired);
        };
        if self.permits(principal.user.role) {
            return Ok(());
        }
        let required = self.threshold().map(|r| r.as_str()).unwrap_or("none");
        Err(ServerError::PermissionDenied(format!(
            "This action requires the {required} role or higher"
        )))
    }
}

/// Middleware enforcing a [`RoleGate`] on a group of routes.
pub async fn require_role(State(gate): State<RoleGate>, request: Request, next: Next) -> Response {
    let principal = request.extensions().get::<Principal>();
    let role = principal.map_or("anonymous", |p| p.user.role.as_str());
    let checked = gate.check(principal);
    let pending = request.extensions().get::<PendingSecondFactor>().is_some();

    let denial = match checked {
        Ok(()) => return next.run(request).await,
        Err(ServerError::AuthenticationRequired) if pending => ServerError::SecondFactorRequired,
        Err(e) => e,
    };

    tracing::debug!(
        path = %request.uri().path(),
        role,
        error = %denial,
        "Role gate rejected request"
    );

    let headers = request.headers();
    if !prefers_html(headers) {
        return denial.into_response();
    }

    let message = denial.public_message();
    let location = match denial {
        ServerError::PermissionDenied(_) => redirect_back(headers, &message),
        _ => format!("{LOGIN_PATH}?error={}", urlencoding::encode(&message)),
    };
    (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response()
}

/// Returns true if the `Accept` header ranks HTML above JSON. A missing
/// header or a bare `*/*` counts as JSON.
pub fn prefers_html(headers: &HeaderMap) -> bool {
    let Some(accept) = headers.get(ACCEPT).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let mut html = 0.0_f32;
    let mut json = 0.0_f32;
    for range in accept.split(',') {
        let mut params = range.split(';');
        let media = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        let quality = params
            .filter_map(|p| p.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        match media.as_str() {
            "text/html" | "application/xhtml+xml" => html = html.max(quality),
            "application/json" => json = json.max(quality),
            _ => {}
        }
    }
    html > 0.0 && html > json
}

/// Builds a same-origin path back to the referring page with `error` set.
/// Foreign or missing referers fall back to `/`.
fn redirect_back(headers: &HeaderMap, message: &str) -> String {
    let host = headers.get(HOST).and_then(|v| v.to_str().ok());
    let referer = headers
        .get(REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Url::parse(v).ok())
        .filter(|url| host.is_some_and(|host| origin_host(url).as_deref() == Some(host)));

    let mut query = form_urlencoded::Serializer::new(String::new());
    let path = match &referer {
        Some(url) => {
            for (key, value) in url.query_pairs().filter(|(key, _)| key != "error") {
                query.append_pair(&key, &value);
            }
            url.path().to_string()
        }
        None => "/".to_string(),
    };
    query.append_pair("error", message);

    format!("{path}?{}", query.finish())
}

fn origin_host(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
