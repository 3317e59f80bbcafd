use std::sync::Arc;

use wizard::parsing::ExtractError;
use wizard::{Dish, Recipe, RecipeRequest};

use crate::providers::{Generators, ImageGenerator, TextGenerator};

pub mod prompts;

pub use prompts::{photograph_prompt, recipe_prompt};

/// MIME type and file extension of an encoded image, sniffed from its first bytes.
pub fn image_format(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    let format = image::guess_format(bytes).ok()?;
    Some((format.to_mime_type(), *format.extensions_str().first()?))
}

#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    #[error("Please enter ingredients to generate a recipe.")]
    NoIngredients,
    #[error("Error generating recipe: {0:#}")]
    Text(anyhow::Error),
    #[error("Could not read the recipe from the model's reply: {0}")]
    Reply(#[from] ExtractError),
}

/// Turns ingredients into a recipe and a picture of it.
#[derive(Clone)]
pub struct Wizard {
    text: Arc<dyn TextGenerator>,
    image: Arc<dyn ImageGenerator>,
}

impl From<Generators> for Wizard {
    fn from(generators: Generators) -> Self {
        Self::new(generators.text, generators.image)
    }
}

impl Wizard {
    pub fn new(text: Arc<dyn TextGenerator>, image: Arc<dyn ImageGenerator>) -> Self {
        Self { text, image }
    }

    /// Ask the text model for a recipe and read it out of the reply.
    pub async fn write_recipe(
        &self,
        request: &RecipeRequest,
    ) -> Result<(Recipe, String), GenerationError> {
        if request.ingredients.trim().is_empty() {
            return Err(GenerationError::NoIngredients);
        }
        tracing::info!("Generating recipe from: {}", request.ingredients.trim());
        let prompt = recipe_prompt(request);
        let reply = self.text.generate_text(&prompt).await.map_err(|e| {
            tracing::error!("Error generating recipe: {e:#}");
            GenerationError::Text(e)
        })?;
        tracing::debug!("Raw reply: {}", reply);
        let recipe = Recipe::from_reply(&reply, request.format).inspect_err(|e| {
            tracing::error!("Could not parse reply: {e}");
        })?;
        Ok((recipe, reply))
    }

    /// Ask the image model for a photo of the finished dish.
    pub async fn photograph(&self, recipe: &Recipe) -> anyhow::Result<Vec<u8>> {
        anyhow::ensure!(
            !recipe.image_subject().is_empty(),
            "Nothing to photograph: the recipe has no title or description"
        );
        let prompt = photograph_prompt(recipe);
        tracing::info!("Generating image for {}", recipe.title);
        tracing::debug!("Image prompt: {}", prompt);
        self.image.generate_image(&prompt).await
    }

    /// The whole request: recipe, then picture.
    ///
    /// A failed picture does not throw away a good recipe; the dish comes back without an
    /// image and with the reason instead.
    pub async fn cook(&self, request: &RecipeRequest) -> Result<Dish, GenerationError> {
        let (recipe, raw_reply) = self.write_recipe(request).await?;
        let (image, image_error) = match self.photograph(&recipe).await {
            Ok(image) => (Some(image), None),
            Err(e) => {
                tracing::error!("Error generating image: {e:#}");
                (None, Some(format!("Error generating image: {e}")))
            }
        };
        Ok(Dish {
            recipe,
            raw_reply,
            image,
            image_error,
        })
    }
}
