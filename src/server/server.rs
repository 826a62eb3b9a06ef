use anyhow::Result;
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tracing::{debug, error};

use crate::catalog_store::{
    paginate, query_movies, CatalogStore, FieldViolation, Movie, MovieDraft, MovieQueryParams,
    Page, PageParams, RatingStore,
};
use crate::ratings::{Rating, RatingDraft, RatingOutcome, RatingService, SubmitRatingError};
use crate::user::{AuthTokenValue, RegisterError, UserManager, UserStore};
use axum_extra::extract::cookie::{Cookie, SameSite};
use tower_http::services::ServeDir;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{response, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::session::Session;
use super::state::*;
use super::{log_requests, RequestsLoggingLevel, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct RegisterBody {
    pub user_handle: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub user_handle: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
    user_id: usize,
}

#[derive(Serialize)]
struct RegisterSuccessResponse {
    user_id: usize,
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: state.version.to_owned(),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

async fn list_movies(
    State(catalog_store): State<GuardedCatalogStore>,
    Query(params): Query<MovieQueryParams>,
) -> Result<Json<Page<Movie>>, ApiError> {
    let movies = catalog_store.all_movies().map_err(ApiError::Internal)?;
    let page = query_movies(&movies, &params.filter(), params.page_request());
    Ok(Json(page))
}

async fn get_movie(
    State(catalog_store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Result<Json<Movie>, ApiError> {
    match catalog_store.get_movie(id).map_err(ApiError::Internal)? {
        Some(movie) => Ok(Json(movie)),
        None => Err(ApiError::NotFound("movie")),
    }
}

async fn create_movie(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Json(draft): Json<MovieDraft>,
) -> Result<(StatusCode, Json<Movie>), ApiError> {
    let new_movie = draft
        .validate(chrono::Utc::now())
        .map_err(ApiError::InvalidInput)?;
    let movie = catalog_store
        .insert_movie(new_movie, session.user_id)
        .map_err(ApiError::Internal)?;
    debug!("User {} created movie {}", session.user_id, movie.id);
    Ok((StatusCode::CREATED, Json(movie)))
}

async fn list_movie_ratings(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Rating>>, ApiError> {
    if state
        .catalog_store
        .get_movie(id)
        .map_err(ApiError::Internal)?
        .is_none()
    {
        return Err(ApiError::NotFound("movie"));
    }
    let ratings = state.rating_store.movie_ratings(id).map_err(ApiError::Internal)?;
    Ok(Json(paginate(&ratings, params.page_request())))
}

async fn submit_rating(
    session: Session,
    State(rating_service): State<GuardedRatingService>,
    Path(id): Path<i64>,
    Json(draft): Json<RatingDraft>,
) -> Result<(StatusCode, Json<Rating>), ApiError> {
    let (rating, outcome) = rating_service
        .submit_rating(id, session.user_id, draft)
        .map_err(|err| {
            let message = err.to_string();
            match err {
                SubmitRatingError::MovieNotFound(_) => ApiError::NotFound("movie"),
                SubmitRatingError::ValueOutOfRange(_) => {
                    ApiError::InvalidInput(vec![FieldViolation::new("rating", message)])
                }
                SubmitRatingError::Storage(err) => ApiError::Internal(err),
            }
        })?;

    let status = match outcome {
        RatingOutcome::Created => StatusCode::CREATED,
        RatingOutcome::Updated => StatusCode::OK,
    };
    Ok((status, Json(rating)))
}

async fn get_own_ratings(
    session: Session,
    State(rating_store): State<GuardedRatingStore>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Rating>>, ApiError> {
    let ratings = rating_store
        .user_ratings(session.user_id)
        .map_err(ApiError::Internal)?;
    Ok(Json(paginate(&ratings, params.page_request())))
}

async fn register(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<RegisterSuccessResponse>), ApiError> {
    let user_id = user_manager
        .lock()
        .unwrap()
        .register(&body.user_handle, &body.password)
        .map_err(|err| match err {
            RegisterError::Invalid(violations) => ApiError::InvalidInput(violations),
            RegisterError::Storage(err) => ApiError::Internal(err),
        })?;
    Ok((StatusCode::CREATED, Json(RegisterSuccessResponse { user_id })))
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<LoginBody>,
) -> Response {
    let locked_manager = user_manager.lock().unwrap();
    let credentials = match locked_manager.get_user_credentials(&body.user_handle) {
        Ok(credentials) => credentials,
        Err(err) => {
            error!("Error loading credentials: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if let Some(credentials) = credentials {
        if let Some(password_credentials) = &credentials.username_password {
            if let Ok(true) = password_credentials.hasher.verify(
                &body.password,
                &password_credentials.hash,
                &password_credentials.salt,
            ) {
                return match locked_manager.generate_auth_token(&credentials) {
                    Ok(auth_token) => {
                        let response_body = LoginSuccessResponse {
                            token: auth_token.value.0.clone(),
                            user_id: auth_token.user_id,
                        };
                        let response_body = serde_json::to_string(&response_body).unwrap();

                        let cookie_value = HeaderValue::from_str(&format!(
                            "session_token={}; Path=/; HttpOnly",
                            auth_token.value.0.clone()
                        ))
                        .unwrap();
                        response::Builder::new()
                            .status(StatusCode::CREATED)
                            .header(axum::http::header::SET_COOKIE, cookie_value)
                            .body(Body::from(response_body))
                            .unwrap()
                    }
                    Err(err) => {
                        error!("Error with auth token generation: {}", err);
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                };
            }
        }
    }
    StatusCode::FORBIDDEN.into_response()
}

async fn logout(State(user_manager): State<GuardedUserManager>, session: Session) -> Response {
    let locked_manager = user_manager.lock().unwrap();
    match locked_manager.delete_auth_token(session.user_id, &AuthTokenValue(session.token)) {
        Ok(()) => {
            let cookie_value = Cookie::build(Cookie::new("session_token", ""))
                .path("/")
                .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1)) // Expire it in the past
                .same_site(SameSite::Lax)
                .build();

            response::Builder::new()
                .status(StatusCode::OK)
                .header(axum::http::header::SET_COOKIE, cookie_value.to_string())
                .body(Body::empty())
                .unwrap()
        }
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

pub fn make_app(
    config: ServerConfig,
    catalog_store: Arc<dyn CatalogStore>,
    rating_store: Arc<dyn RatingStore>,
    user_store: Arc<dyn UserStore>,
) -> Result<Router> {
    let rating_service = Arc::new(RatingService::new(
        catalog_store.clone(),
        rating_store.clone(),
    ));
    let user_manager = Arc::new(Mutex::new(UserManager::new(user_store)));

    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        catalog_store,
        rating_store,
        rating_service,
        user_manager,
        version: env!("CARGO_PKG_VERSION"),
    };

    let auth_routes: Router = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .with_state(state.clone());

    let catalog_routes: Router = Router::new()
        .route("/movies", get(list_movies))
        .route("/movies", post(create_movie))
        .route("/movies/{id}", get(get_movie))
        .route("/movies/{id}/ratings", get(list_movie_ratings))
        .route("/movies/{id}/ratings", post(submit_rating))
        .with_state(state.clone());

    let user_routes: Router = Router::new()
        .route("/ratings", get(get_own_ratings))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/catalog", catalog_routes)
        .nest("/v1/user", user_routes)
        .layer(middleware::from_fn_with_state(state, log_requests));

    Ok(app)
}

pub async fn run_server(
    catalog_store: Arc<dyn CatalogStore>,
    rating_store: Arc<dyn RatingStore>,
    user_store: Arc<dyn UserStore>,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    frontend_dir_path: Option<String>,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
        frontend_dir_path,
    };
    let app = make_app(config, catalog_store, rating_store, user_store)?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
