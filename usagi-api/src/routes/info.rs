use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/info", get(info))
}

#[derive(Debug, Serialize)]
struct Info {
    name: &'static str,
    version: &'static str,
}

async fn info() -> Json<Info> {
    Json(Info {
        name: "Usagi",
        version: env!("CARGO_PKG_VERSION"),
    })
}
