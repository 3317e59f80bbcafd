use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Form, Json, Router,
};
use base64::Engine;
use minijinja::context;
use serde::{Deserialize, Serialize};
use wizard::nutrition::MacroBreakdown;
use wizard::{Dish, Recipe, RecipeRequest};
use wizard_client::config::ApiKeys;
use wizard_client::generation::image_format;
use wizard_client::{providers, Provider, Wizard};

use crate::config::Config;
use crate::errors::{WebError, WebResult};

/// Convert an image to a data URL, with the MIME type sniffed from its bytes.
fn to_data_url(bytes: &[u8]) -> String {
    let mime = image_format(bytes).map_or("application/octet-stream", |(mime, _)| mime);
    format!(
        "data:{mime};base64,{}",
        // For the purpose of data urls, you do NOT need to use the URL_SAFE variant
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

lazy_static::lazy_static! {
    static ref TEMPLATES: minijinja::Environment<'static> = {
        let mut env = minijinja::Environment::new();
        for (name, template) in &[
            ("base.html.jinja", include_str!("../templates/base.html.jinja")),
            ("index.html.jinja", include_str!("../templates/index.html.jinja")),
        ] {
            env.add_template(name, template)
                .expect("Failed to register template");
        }
        // Recipes come straight from a model, so escape them whatever the template name says
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::Html);
        env
    };
}

/// One connected wizard per enabled provider.
#[derive(Clone)]
pub struct AppState {
    wizards: Arc<BTreeMap<Provider, Wizard>>,
    default_provider: Provider,
}

impl AppState {
    pub fn new(
        wizards: BTreeMap<Provider, Wizard>,
        default_provider: Provider,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            wizards.contains_key(&default_provider),
            "The default provider {default_provider} is not enabled"
        );
        Ok(Self {
            wizards: Arc::new(wizards),
            default_provider,
        })
    }

    /// Connect every enabled provider. A missing API key fails here, before serving anything.
    pub async fn connect(config: &Config, keys: &ApiKeys) -> anyhow::Result<Self> {
        config.wizard.validate()?;
        let mut wizards = BTreeMap::new();
        for &provider in &config.wizard.enabled {
            let generators = providers::connect(provider, &config.providers, keys)
                .await
                .with_context(|| format!("Connecting to {provider}"))?;
            tracing::info!("Connected to {}", provider);
            wizards.insert(provider, Wizard::from(generators));
        }
        Self::new(wizards, config.wizard.default_provider)
    }

    fn wizard(&self, provider: Option<Provider>) -> WebResult<(Provider, &Wizard)> {
        let provider = provider.unwrap_or(self.default_provider);
        self.wizards
            .get(&provider)
            .map(|wizard| (provider, wizard))
            .ok_or_else(|| WebError::BadRequest(format!("The {provider} provider is not enabled")))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // `GET /` goes to `root`
        .route("/", get(root))
        // `POST /generate` goes to `generate`
        .route("/generate", post(generate))
        // `POST /api/recipe` goes to `api_recipe`
        .route("/api/recipe", post(api_recipe))
        // `GET /health` goes to `health`
        .route("/health", get(health))
        // serve static files from the `./static` directory
        .route("/static/*path", get(serve_static))
        .layer(
            tower_http::compression::CompressionLayer::new()
                .quality(tower_http::CompressionLevel::Fastest),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// The form fields, also accepted as the JSON API body
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CookRequest {
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(flatten)]
    pub request: RecipeRequest,
}

/// What the result page needs to know about a dish
#[derive(Serialize)]
struct DishPage<'a> {
    recipe: &'a Recipe,
    image_url: Option<String>,
    image_error: Option<&'a str>,
    breakdown: Option<MacroBreakdown>,
    /// Model output is rendered as markdown, which escapes any raw HTML in it
    reply_html: String,
}

impl<'a> From<&'a Dish> for DishPage<'a> {
    fn from(dish: &'a Dish) -> Self {
        Self {
            recipe: &dish.recipe,
            image_url: dish.image.as_deref().map(to_data_url),
            image_error: dish.image_error.as_deref(),
            breakdown: MacroBreakdown::from_nutrition(&dish.recipe.nutrition),
            reply_html: markdown::to_html(&dish.raw_reply),
        }
    }
}

fn render_index(
    state: &AppState,
    form: &CookRequest,
    dish: Option<&Dish>,
    error: Option<&str>,
) -> WebResult<String> {
    Ok(TEMPLATES.get_template("index.html.jinja")?.render(context! {
        providers => state.wizards.keys().collect::<Vec<_>>(),
        selected_provider => form.provider.unwrap_or(state.default_provider),
        form => form,
        dish => dish.map(DishPage::from),
        error => error,
    })?)
}

// Render the empty ingredient form
async fn root(State(state): State<AppState>) -> WebResult<Html<String>> {
    Ok(Html(render_index(&state, &CookRequest::default(), None, None)?))
}

/// Cook a dish from the form and render it under the form, or the form again with the error.
async fn generate(
    State(state): State<AppState>,
    Form(form): Form<CookRequest>,
) -> WebResult<(StatusCode, Html<String>)> {
    let outcome = match state.wizard(form.provider) {
        Ok((_, wizard)) => wizard.cook(&form.request).await.map_err(WebError::from),
        Err(e) => Err(e),
    };
    let (status, page) = match &outcome {
        Ok(dish) => (StatusCode::OK, render_index(&state, &form, Some(dish), None)?),
        Err(e) => {
            tracing::warn!("Could not cook: {}", e);
            (
                e.status(),
                render_index(&state, &form, None, Some(&e.to_string()))?,
            )
        }
    };
    Ok((status, Html(page)))
}

/// A dish as JSON, with the image inlined as base64
#[derive(Debug, Serialize)]
pub struct DishResponse {
    pub provider: Provider,
    pub recipe: Recipe,
    pub raw_reply: String,
    pub image_base64: Option<String>,
    pub image_type: Option<&'static str>,
    pub image_error: Option<String>,
    pub nutrition_breakdown: Option<MacroBreakdown>,
}

impl DishResponse {
    pub fn new(provider: Provider, dish: Dish) -> Self {
        let image_type = dish
            .image
            .as_deref()
            .and_then(image_format)
            .map(|(mime, _)| mime);
        Self {
            provider,
            nutrition_breakdown: MacroBreakdown::from_nutrition(&dish.recipe.nutrition),
            image_base64: dish
                .image
                .map(|b| base64::engine::general_purpose::STANDARD.encode(b)),
            image_type,
            image_error: dish.image_error,
            raw_reply: dish.raw_reply,
            recipe: dish.recipe,
        }
    }
}

async fn api_recipe(
    State(state): State<AppState>,
    Json(body): Json<CookRequest>,
) -> WebResult<Json<DishResponse>> {
    let (provider, wizard) = state.wizard(body.provider)?;
    let dish = wizard.cook(&body.request).await?;
    Ok(Json(DishResponse::new(provider, dish)))
}

// Just reply that everything is okay
async fn health() -> StatusCode {
    StatusCode::OK
}

/// Serve static files from in memory using `include_dir!`
async fn serve_static(Path(path): Path<String>) -> WebResult<impl IntoResponse> {
    let dir = include_dir::include_dir!("$CARGO_MANIFEST_DIR/static");
    let bytes = dir.get_file(&path).ok_or(WebError::NotFound)?.contents();
    let header = (
        "Content-Type",
        match path.split('.').last() {
            Some("css") => "text/css",
            Some("js") => "text/javascript",
            Some("png") => "image/png",
            Some("svg") => "image/svg+xml",
            _ => "application/octet-stream",
        },
    );
    Ok(([header], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_urls_carry_the_sniffed_type() {
        assert_eq!(
            to_data_url(b"\x89PNG\r\n\x1a\n"),
            "data:image/png;base64,iVBORw0KGgo="
        );
        assert!(to_data_url(b"abc").starts_with("data:application/octet-stream;base64,"));
    }

    #[test]
    fn form_fields_fill_the_request() {
        let form: CookRequest = serde_json::from_value(serde_json::json!({
            "provider": "huggingface",
            "ingredients": "eggs",
            "cuisine": "French",
            "format": "json",
        }))
        .unwrap();
        assert_eq!(form.provider, Some(Provider::HuggingFace));
        assert_eq!(form.request.ingredients, "eggs");
        assert_eq!(form.request.cuisine, "French");
        assert_eq!(form.request.format, wizard::ReplyFormat::Json);
    }
}
