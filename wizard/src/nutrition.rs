use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref QUANTITY: Regex = Regex::new(r"\d+(?:\.\d+)?").unwrap();
}

/// Calories per gram
const PROTEIN_KCAL: f64 = 4.0;
const CARBOHYDRATE_KCAL: f64 = 4.0;
const FAT_KCAL: f64 = 9.0;

/// Pull the number out of a quantity like `"25g"` or `"about 1.5 grams"`.
pub fn leading_quantity(text: &str) -> Option<f64> {
    QUANTITY.find(text)?.as_str().parse().ok()
}

/// One slice of the macronutrient chart
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MacroShare {
    pub name: &'static str,
    pub grams: f64,
    pub calories: f64,
    pub percent: f64,
    /// Where this slice ends on the chart, as a running percentage
    pub until_percent: f64,
    pub color: &'static str,
}

/// How protein, carbohydrates and fats each contribute to a recipe's calories.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MacroBreakdown {
    pub total_calories: f64,
    pub shares: Vec<MacroShare>,
}

fn grams_of(nutrition: &BTreeMap<String, String>, keys: &[&str]) -> f64 {
    nutrition
        .iter()
        .find(|(name, _)| keys.iter().any(|k| name.trim().eq_ignore_ascii_case(k)))
        .and_then(|(_, quantity)| leading_quantity(quantity))
        .unwrap_or_default()
}

impl MacroBreakdown {
    /// Compute the breakdown, or `None` when there are no macros to chart.
    pub fn from_nutrition(nutrition: &BTreeMap<String, String>) -> Option<Self> {
        let macros = [
            ("Protein", &["protein"][..], PROTEIN_KCAL, "#4CAF50"),
            (
                "Carbohydrates",
                &["carbohydrates", "carbs", "carbohydrate"][..],
                CARBOHYDRATE_KCAL,
                "#FFC107",
            ),
            ("Fats", &["fats", "fat"][..], FAT_KCAL, "#2196F3"),
        ];
        let total_calories = macros
            .iter()
            .map(|(_, keys, kcal, _)| grams_of(nutrition, keys) * kcal)
            .sum::<f64>();
        if total_calories <= 0.0 {
            return None;
        }
        let mut until_percent = 0.0;
        let shares = macros
            .iter()
            .map(|(name, keys, kcal, color)| {
                let grams = grams_of(nutrition, keys);
                let calories = grams * kcal;
                let percent = 100.0 * calories / total_calories;
                until_percent += percent;
                MacroShare {
                    name: *name,
                    grams,
                    calories,
                    percent,
                    until_percent,
                    color: *color,
                }
            })
            .collect();
        Some(Self {
            total_calories,
            shares,
        })
    }
}
