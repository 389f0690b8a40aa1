use axum::{
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::{app_state::AppState, auth::USER_HEADER, config::Settings, routes};

pub fn create(app_state: AppState, config: &Settings) -> Router<()> {
    let api = Router::new()
        .merge(routes::info::router())
        .merge(routes::mapping::router())
        .merge(routes::search::router())
        .merge(routes::vocabulary::router());

    let base_app = Router::new()
        .route("/", get(|| async { "Usagi" }))
        .nest("/api", api);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(USER_HEADER)]);
    let cors = match config
        .application
        .app_url
        .as_deref()
        .and_then(|url| HeaderValue::from_str(url).ok())
    {
        Some(origin) => cors.allow_origin(AllowOrigin::exact(origin)),
        None => cors.allow_origin(Any),
    };

    base_app
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}
