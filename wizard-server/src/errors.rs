use axum::{
    http,
    response::{IntoResponse, Response},
};
use wizard_client::GenerationError;

pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Internal Server Error: {0}")]
    Internal(#[from] anyhow::Error),
    #[error("Templating error: {0:#}")]
    Template(#[from] minijinja::Error),
    #[error("{0}")]
    BadRequest(String),
    /// The model provider failed or sent something we could not read
    #[error("{0}")]
    Upstream(String),
    #[error("Not found")]
    NotFound,
}

impl From<GenerationError> for WebError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::NoIngredients => WebError::BadRequest(e.to_string()),
            _ => WebError::Upstream(e.to_string()),
        }
    }
}

impl WebError {
    pub fn status(&self) -> http::StatusCode {
        match self {
            WebError::Internal(_) | WebError::Template(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
            WebError::BadRequest(_) => http::StatusCode::BAD_REQUEST,
            WebError::Upstream(_) => http::StatusCode::BAD_GATEWAY,
            WebError::NotFound => http::StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::NotFound => (self.status(), "Not Found").into_response(),
            // Request and provider problems are always explained
            _ => (self.status(), self.to_string()).into_response(),
        }
    }
}
