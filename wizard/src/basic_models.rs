use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// How the model is asked to lay out its reply, which decides how the reply is parsed.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyFormat {
    /// `Title:` / `Ingredients:` / `Instructions:` / `Summary:` labeled text
    #[default]
    Sections,
    /// A JSON object, possibly wrapped in a ```json fence
    Json,
}

/// What the user asked for.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct RecipeRequest {
    pub ingredients: String,
    #[serde(default)]
    pub items_to_avoid: String,
    #[serde(default)]
    pub dietary_constraints: String,
    #[serde(default)]
    pub cuisine: String,
    #[serde(default)]
    pub time_constraint: String,
    #[serde(default)]
    pub format: ReplyFormat,
}

impl RecipeRequest {
    pub fn new(ingredients: impl Into<String>) -> Self {
        Self {
            ingredients: ingredients.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub item: String,
    pub amount: Option<String>,
    pub measure: Option<String>,
}

impl Ingredient {
    /// Read one ingredient line as the model wrote it.
    ///
    /// List markers are dropped. A line of exactly three comma-separated parts is read as
    /// `item, amount, measure`; anything else is kept whole as the item.
    pub fn from_line(line: &str) -> Self {
        let line = line
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim_start();
        let parts = line.split(',').map(str::trim).collect::<Vec<_>>();
        match parts[..] {
            [item, amount, measure] if !item.is_empty() => Self {
                item: item.to_string(),
                amount: Some(amount.to_string()).filter(|a| !a.is_empty()),
                measure: Some(measure.to_string()).filter(|m| !m.is_empty()),
            },
            _ => Self {
                item: line.to_string(),
                amount: None,
                measure: None,
            },
        }
    }
}

impl std::fmt::Display for Ingredient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts = [Some(&self.item), self.amount.as_ref(), self.measure.as_ref()];
        write!(f, "{}", parts.into_iter().flatten().join(" "))
    }
}

/// A recipe, as best as it could be read out of the model's reply.
///
/// Every field is best-effort: anything the model left out stays empty.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct Recipe {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<String>,
    /// Minutes
    pub cooking_time: Option<u32>,
    pub difficulty: Option<String>,
    pub dietary_constraints: Option<String>,
    /// Nutrient name to quantity, e.g. `protein` to `25g`
    pub nutrition: BTreeMap<String, String>,
    pub suggestions: Vec<String>,
    /// Used as the prompt for the food photo
    pub image_description: String,
}

impl Recipe {
    /// What to describe to the image model: the visual description, or the title if there isn't one.
    pub fn image_subject(&self) -> &str {
        if self.image_description.trim().is_empty() {
            self.title.trim()
        } else {
            self.image_description.trim()
        }
    }

    /// Render as a small markdown document
    pub fn to_markdown(&self) -> String {
        let mut md = format!("# {}\n\n", self.title);
        if !self.description.is_empty() {
            md += &format!("{}\n\n", self.description);
        }
        md += "## Ingredients\n\n";
        for ingredient in &self.ingredients {
            md += &format!("- {ingredient}\n");
        }
        md += "\n## Instructions\n\n";
        for (i, step) in self.instructions.iter().enumerate() {
            md += &format!("{}. {}\n", i + 1, step);
        }
        let mut facts = vec![];
        if let Some(minutes) = self.cooking_time {
            facts.push(format!("- Cooking time: {minutes} minutes"));
        }
        if let Some(difficulty) = &self.difficulty {
            facts.push(format!("- Difficulty: {difficulty}"));
        }
        if let Some(constraints) = &self.dietary_constraints {
            facts.push(format!("- Dietary constraints: {constraints}"));
        }
        facts.extend(
            self.nutrition
                .iter()
                .map(|(name, quantity)| format!("- {name}: {quantity}")),
        );
        if !facts.is_empty() {
            md += &format!("\n## Details\n\n{}\n", facts.join("\n"));
        }
        if !self.suggestions.is_empty() {
            md += &format!("\n## You could also add\n\n{}\n", self.suggestions.join(", "));
        }
        md
    }
}

/// One finished request: the recipe and its picture.
#[derive(Deserialize, Serialize, Clone)]
pub struct Dish {
    pub recipe: Recipe,
    /// The model's reply, verbatim
    pub raw_reply: String,
    pub image: Option<Vec<u8>>,
    /// Why there is no image, when image generation failed
    pub image_error: Option<String>,
}

impl std::fmt::Debug for Dish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dish")
            .field("recipe", &self.recipe)
            .field("raw_reply", &self.raw_reply.len())
            .field("image", &self.image.as_ref().map(Vec::len))
            .field("image_error", &self.image_error)
            .finish()
    }
}
