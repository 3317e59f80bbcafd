pub mod basic_models;
pub mod nutrition;
pub mod parsing;

pub use basic_models::{Dish, Ingredient, Recipe, RecipeRequest, ReplyFormat};
