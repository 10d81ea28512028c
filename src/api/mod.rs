use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorBody;

mod admin;
mod public;
mod voter;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voter::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Give every response that did not come from a handler the same JSON shape
/// as handler errors.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> Json<ErrorBody> {
    let error = match status.code {
        400 | 422 => "validation",
        401 => "unauthorized",
        403 => "forbidden",
        404 => "not_found",
        _ => "internal",
    };
    Json(ErrorBody {
        error,
        message: status.reason_lossy().to_string(),
    })
}
