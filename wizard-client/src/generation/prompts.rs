use lazy_static::lazy_static;
use regex::{Captures, Regex};
use wizard::{Recipe, RecipeRequest, ReplyFormat};

use crate::providers::Prompt;

pub const CHEF_ROLE: &str = "You are a world-renowned chef";

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{(\w+)\}").unwrap();
}

/// Fill every `{name}` placeholder in one pass, so braces in the filled-in text stay as typed.
/// Placeholders without a value are left alone.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(|| caps[0].to_string(), |(_, value)| value.to_string())
        })
        .into_owned()
}

/// Blank constraints read better to the model as "none" than as nothing.
fn or_none(value: &str) -> &str {
    match value.trim() {
        "" => "none",
        trimmed => trimmed,
    }
}

/// Fill in the recipe prompt for the requested reply format.
pub fn recipe_prompt(request: &RecipeRequest) -> Prompt {
    let prompt_template = match request.format {
        ReplyFormat::Sections => include_str!("../../prompts/recipe-sections.md"),
        ReplyFormat::Json => include_str!("../../prompts/recipe-json.md"),
    };
    let prompt = fill_template(
        prompt_template,
        &[
            ("ingredients", request.ingredients.trim()),
            ("items_to_avoid", or_none(&request.items_to_avoid)),
            ("dietary_constraints", or_none(&request.dietary_constraints)),
            ("cuisine", or_none(&request.cuisine)),
            ("time_constraint", or_none(&request.time_constraint)),
        ],
    );
    Prompt::new(prompt).with_system(CHEF_ROLE)
}

/// Describe the finished dish for the image model
pub fn photograph_prompt(recipe: &Recipe) -> String {
    let prompt_template = include_str!("../../prompts/photograph.md");
    fill_template(prompt_template, &[("content", recipe.image_subject())])
        .trim()
        .to_string()
}
