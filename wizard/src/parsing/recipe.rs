use std::collections::BTreeMap;

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use super::json::{extract_json, ExtractError};
use super::sections::SectionExtractor;
use crate::basic_models::{Ingredient, Recipe, ReplyFormat};

lazy_static! {
    static ref STEP_NUMBER: Regex = Regex::new(r"^(?:\d+\s*[.):]|[-*•])\s*").unwrap();
    static ref FIRST_NUMBER: Regex = Regex::new(r"\d+").unwrap();
}

/// Drop the `1.` / `2)` / `-` a model puts in front of a step
fn strip_step_marker(line: &str) -> &str {
    let line = line.trim();
    STEP_NUMBER
        .find(line)
        .map_or(line, |m| &line[m.end()..])
        .trim()
}

impl Recipe {
    /// Read a recipe out of a reply in whichever format it was requested in.
    pub fn from_reply(reply: &str, format: ReplyFormat) -> Result<Self, ExtractError> {
        match format {
            ReplyFormat::Sections => Ok(Self::from_sections(reply)),
            ReplyFormat::Json => Self::from_json_reply(reply),
        }
    }

    /// Read a `Title:` / `Ingredients:` / `Instructions:` / `Summary:` reply.
    ///
    /// This never fails; sections the model skipped come back empty.
    pub fn from_sections(reply: &str) -> Self {
        let extractor = SectionExtractor::default();
        let section = |label: &str| {
            extractor.find_section(reply, label).unwrap_or_else(|| {
                tracing::warn!("Model reply has no {label} section");
                String::new()
            })
        };
        let summary = section("Summary");
        Self {
            title: section("Title"),
            ingredients: section("Ingredients")
                .lines()
                .map(Ingredient::from_line)
                .filter(|i| !i.item.is_empty())
                .collect(),
            instructions: section("Instructions")
                .lines()
                .map(strip_step_marker)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            description: summary.clone(),
            image_description: summary,
            ..Default::default()
        }
    }

    /// Read a JSON reply, fenced or bare.
    ///
    /// Only JSON that does not parse is an error. A field of an unexpected shape is
    /// read as well as it can be, or left empty.
    pub fn from_json_reply(reply: &str) -> Result<Self, ExtractError> {
        let value = extract_json(reply)?;
        let Some(fields) = value.as_object() else {
            tracing::warn!("Model reply is JSON but not an object");
            return Ok(Self::default());
        };
        Ok(Self::from_json_fields(fields))
    }

    fn from_json_fields(fields: &Map<String, Value>) -> Self {
        let field = |keys: &[&str]| lookup(fields, keys);
        Recipe {
            title: field(TITLE_KEYS).and_then(text).unwrap_or_default(),
            description: field(DESCRIPTION_KEYS).and_then(text).unwrap_or_default(),
            ingredients: field(INGREDIENT_KEYS).map(ingredients).unwrap_or_default(),
            instructions: field(INSTRUCTION_KEYS).map(lines).unwrap_or_default(),
            cooking_time: field(COOKING_TIME_KEYS).and_then(minutes),
            difficulty: field(DIFFICULTY_KEYS).and_then(text),
            dietary_constraints: field(DIETARY_KEYS).and_then(text),
            nutrition: field(NUTRITION_KEYS).map(nutrition).unwrap_or_default(),
            suggestions: field(SUGGESTION_KEYS).map(names).unwrap_or_default(),
            image_description: field(IMAGE_KEYS).and_then(text).unwrap_or_default(),
        }
    }
}

// Every key each field has been seen under, most preferred first
const TITLE_KEYS: &[&str] = &["title", "name", "dishName", "recipe_name"];
const DESCRIPTION_KEYS: &[&str] = &["description", "recipe_description", "summary"];
const INGREDIENT_KEYS: &[&str] = &["ingredients"];
const INSTRUCTION_KEYS: &[&str] = &["instructions", "cookingInstructions", "steps"];
const COOKING_TIME_KEYS: &[&str] = &["cooking_time", "cookingTime", "total_time"];
const DIFFICULTY_KEYS: &[&str] = &["difficulty"];
const DIETARY_KEYS: &[&str] = &["dietary_constraints", "dietaryConstraints"];
const NUTRITION_KEYS: &[&str] = &["nutrition", "nutrition_info", "nutritionInfo"];
const SUGGESTION_KEYS: &[&str] = &["suggestions", "ingredient_suggestions"];
const IMAGE_KEYS: &[&str] = &["image_description", "recipe_image_description", "image_prompt"];

/// Keys that hold the readable part of an object the model used where text was expected
const TEXT_KEYS: &[&str] = &[
    "description",
    "instruction",
    "text",
    "step",
    "name",
    "item",
    "amount",
    "value",
];

/// The first non-null value under any of `keys`, falling back to a nested `recipe_details`.
fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
        .or_else(|| {
            fields
                .get("recipe_details")
                .and_then(Value::as_object)
                .and_then(|details| lookup(details, keys))
        })
}

/// Numbers come back as strings about half the time
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Best-effort text: scalars as they are, lists joined, objects by their readable key.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let joined = items.iter().filter_map(text).join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        Value::Object(fields) => lookup(fields, TEXT_KEYS).and_then(scalar_text),
        scalar => scalar_text(scalar),
    }
}

/// One entry per line or list item, with step markers removed
fn lines(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        other => text(other)
            .map(|t| t.lines().map(String::from).collect())
            .unwrap_or_default(),
    };
    raw.iter()
        .map(|line| strip_step_marker(line))
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Names out of a list of names or of objects, or a comma separated string
fn names(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        other => text(other)
            .map(|t| {
                t.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn ingredient(value: &Value) -> Option<Ingredient> {
    let ingredient = match value {
        Value::Object(fields) => Ingredient {
            item: lookup(fields, &["item", "name", "ingredient"])
                .and_then(text)
                .unwrap_or_default(),
            amount: lookup(fields, &["amount", "quantity"]).and_then(scalar_text),
            measure: lookup(fields, &["measure", "unit"]).and_then(scalar_text),
        },
        Value::String(line) => Ingredient::from_line(line),
        _ => return None,
    };
    (!ingredient.item.is_empty()).then_some(ingredient)
}

fn ingredients(value: &Value) -> Vec<Ingredient> {
    match value {
        Value::Array(items) => items.iter().filter_map(ingredient).collect(),
        Value::String(list) => list
            .lines()
            .map(Ingredient::from_line)
            .filter(|i| !i.item.is_empty())
            .collect(),
        other => ingredient(other).into_iter().collect(),
    }
}

fn nutrition(value: &Value) -> BTreeMap<String, String> {
    value
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|(name, quantity)| Some((name.clone(), text(quantity)?)))
                .collect()
        })
        .unwrap_or_default()
}

fn minutes(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => FIRST_NUMBER.find(s)?.as_str().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use test_case::test_case;

    #[test]
    fn sections_reply() {
        let reply = indoc! {"
            Title: Tomato Basil Pasta

            Ingredients:
            - 200g spaghetti
            - Tomatoes, 4, whole

            Instructions:
            1. Boil the pasta.
            2) Chop the tomatoes.

            Summary: A bright red pasta dish topped with torn basil leaves.
        "};
        let recipe = Recipe::from_sections(reply);
        assert_eq!(recipe.title, "Tomato Basil Pasta");
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].item, "200g spaghetti");
        assert_eq!(recipe.ingredients[1].amount.as_deref(), Some("4"));
        assert_eq!(
            recipe.instructions,
            vec!["Boil the pasta.", "Chop the tomatoes."]
        );
        assert_eq!(
            recipe.image_description,
            "A bright red pasta dish topped with torn basil leaves."
        );
        assert_eq!(recipe.description, recipe.image_description);
    }

    #[test]
    fn sections_reply_without_labels_is_empty() {
        let recipe = Recipe::from_sections("I'd suggest making soup!");
        assert_eq!(recipe, Recipe::default());
    }

    #[test_case("1. Boil" => "Boil")]
    #[test_case("12) Serve hot" => "Serve hot")]
    #[test_case("- Stir" => "Stir")]
    #[test_case("Preheat to 200C." => "Preheat to 200C.")]
    fn step_markers(line: &str) -> &str {
        strip_step_marker(line)
    }

    #[test]
    fn structured_json_reply() {
        let reply = indoc! {r#"
            ```json
            {
              "name": "Peppermint Bark",
              "ingredients": [
                {"item": "White chocolate", "amount": 200, "measure": "g"},
                {"item": "Peppermint extract", "amount": "1/2", "measure": "tsp"}
              ],
              "instructions": ["Melt the chocolate", "Stir in the extract"],
              "cooking_time": "20 minutes",
              "difficulty": "Easy",
              "recipe_description": "A festive treat.",
              "recipe_image_description": "Shards of white chocolate bark",
              "dietary_constraints": ["Gluten Free", "Nut Free"]
            }
            ```
        "#};
        let recipe = Recipe::from_json_reply(reply).unwrap();
        assert_eq!(recipe.title, "Peppermint Bark");
        assert_eq!(recipe.ingredients[0].to_string(), "White chocolate 200 g");
        assert_eq!(recipe.ingredients[1].amount.as_deref(), Some("1/2"));
        assert_eq!(recipe.cooking_time, Some(20));
        assert_eq!(recipe.difficulty.as_deref(), Some("Easy"));
        assert_eq!(recipe.description, "A festive treat.");
        assert_eq!(recipe.image_description, "Shards of white chocolate bark");
        assert_eq!(
            recipe.dietary_constraints.as_deref(),
            Some("Gluten Free, Nut Free")
        );
    }

    #[test]
    fn nested_recipe_details_reply() {
        let reply = r#"{
            "recipe_details": {
                "title": "Chicken Fried Rice",
                "ingredients": ["Chicken", "Rice", "Garlic"],
                "instructions": ["Cook rice", "Fry everything"]
            },
            "image_prompt": "A wok of fried rice",
            "ingredient_suggestions": ["Scallions"],
            "nutrition_info": {"calories": "450 kcal", "protein": "30g", "fats": 12}
        }"#;
        let recipe = Recipe::from_json_reply(reply).unwrap();
        assert_eq!(recipe.title, "Chicken Fried Rice");
        assert_eq!(recipe.ingredients.len(), 3);
        assert_eq!(recipe.instructions.len(), 2);
        assert_eq!(recipe.image_description, "A wok of fried rice");
        assert_eq!(recipe.suggestions, vec!["Scallions"]);
        assert_eq!(recipe.nutrition["protein"], "30g");
        assert_eq!(recipe.nutrition["fats"], "12");
    }

    #[test]
    fn instructions_as_one_string() {
        let reply = r#"{"dishName": "Omelette", "ingredients": ["Eggs"],
            "cookingInstructions": "1. Whisk the eggs\n2. Cook in butter"}"#;
        let recipe = Recipe::from_json_reply(reply).unwrap();
        assert_eq!(recipe.title, "Omelette");
        assert_eq!(recipe.instructions, vec!["Whisk the eggs", "Cook in butter"]);
    }

    #[test_case(
        r#"{"name": "Stew", "ingredient_suggestions": [{"name": "Thyme", "reason": "earthy"}, "Bay leaf"]}"#
        => vec!["Thyme", "Bay leaf"];
        "suggestions as objects"
    )]
    #[test_case(r#"{"ingredient_suggestions": "Thyme, Bay leaf"}"# => vec!["Thyme", "Bay leaf"]; "suggestions as one string")]
    #[test_case(r#"{"ingredient_suggestions": {"herb": 1}}"# => Vec::<String>::new(); "suggestions of no known shape")]
    fn suggestions_of_any_shape(reply: &str) -> Vec<String> {
        Recipe::from_json_reply(reply).unwrap().suggestions
    }

    #[test_case(
        r#"{"instructions": [{"step": 1, "description": "Boil the water"}, {"step": 2, "description": "Add salt"}]}"#
        => vec!["Boil the water", "Add salt"];
        "steps as objects"
    )]
    #[test_case(r#"{"steps": [{"text": "Stir"}, "2. Serve"]}"# => vec!["Stir", "Serve"]; "mixed steps")]
    #[test_case(r#"{"instructions": 42}"# => vec!["42"]; "a bare number")]
    fn instructions_of_any_shape(reply: &str) -> Vec<String> {
        Recipe::from_json_reply(reply).unwrap().instructions
    }

    #[test_case(r#"{"name": "Stew", "title": "Beef Stew"}"# => "Beef Stew"; "title wins over name")]
    #[test_case(r#"{"dishName": "Stew", "name": "Hearty Stew"}"# => "Hearty Stew"; "name wins over dishName")]
    #[test_case(r#"{"title": null, "name": "Stew"}"# => "Stew"; "null falls through")]
    #[test_case(r#"{"title": {"text": "Stew"}}"# => "Stew"; "title as an object")]
    #[test_case(r#"{"title": ["Stew"], "recipe_details": {"title": "Soup"}}"# => "Stew"; "top level before details")]
    fn title_keys_by_precedence(reply: &str) -> String {
        Recipe::from_json_reply(reply).unwrap().title
    }

    #[test]
    fn odd_shapes_keep_the_rest_of_the_recipe() {
        let reply = r#"{
            "name": "Stew", "title": "Beef Stew",
            "ingredients": [{"name": "Beef", "quantity": 500, "unit": "g"}, "Carrots, 2, whole", 7],
            "instructions": [{"step": 1, "description": "Brown the beef"}],
            "ingredient_suggestions": [{"name": "Thyme"}],
            "cooking_time": {"minutes": 90},
            "nutrition_info": {"protein": {"amount": "40g"}, "fats": 20}
        }"#;
        let recipe = Recipe::from_json_reply(reply).unwrap();
        assert_eq!(recipe.title, "Beef Stew");
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].to_string(), "Beef 500 g");
        assert_eq!(recipe.ingredients[1].item, "Carrots");
        assert_eq!(recipe.instructions, vec!["Brown the beef"]);
        assert_eq!(recipe.suggestions, vec!["Thyme"]);
        assert_eq!(recipe.cooking_time, None);
        assert_eq!(recipe.nutrition["protein"], "40g");
        assert_eq!(recipe.nutrition["fats"], "20");
    }

    #[test]
    fn json_that_is_not_an_object_is_an_empty_recipe() {
        assert_eq!(
            Recipe::from_json_reply("```json
[1, 2]
```").unwrap(),
            Recipe::default()
        );
    }

    #[test]
    fn malformed_json_is_still_an_error() {
        let err = Recipe::from_json_reply(r#"```json
{"name": "Stew",,}
```"#).unwrap_err();
        assert!(matches!(err, ExtractError::Json(_)));
    }

    #[test]
    fn json_format_requires_json() {
        let err = Recipe::from_reply("Title: Soup", ReplyFormat::Json).unwrap_err();
        assert!(matches!(err, ExtractError::NoJsonBlock));
    }
}
