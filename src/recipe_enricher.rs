use anyhow::{Context, Result};
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::recipe_aggregator::{AggregateNutrition, NutritionAggregator, NutritionSource};

pub const PROVENANCE_MARKER: &str = "[Nutrition data: USDA FoodData Central]";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Macros {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<String>,
}

/// A recipe as produced by the recipe-generation model.
///
/// Enrichment only ever rewrites `calories`, `macros` and appends to
/// `match_reason`. Optional fields that were absent stay absent on output,
/// and fields outside the schema are carried through untouched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_reason: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub calories: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macros: Option<Macros>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_tip: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Recipe {
    pub fn ingredients(&self) -> &[String] {
        self.ingredients.as_deref().unwrap_or_default()
    }
}

/// Model output is loose about numbers: `450.5`, `"450"`, `"450 kcal"`.
/// Fractions round to the nearest whole number, negatives clamp to 0, and
/// anything unreadable is dropped rather than failing the whole file.
fn whole_number(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches(|c: char| c.is_alphabetic())
            .trim()
            .parse::<f64>()
            .ok(),
        _ => None,
    }?;
    number.is_finite().then(|| number.round().max(0.0) as u32)
}

fn lenient_whole_number<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(whole_number))
}

/// Enriched recipe plus the numbers behind it, for callers that want to
/// show source/confidence themselves. `nutrition` is `None` when enrichment
/// was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentOutcome {
    pub recipe: Recipe,
    pub nutrition: Option<AggregateNutrition>,
}

fn grams(value: u32) -> Option<String> {
    Some(format!("{}g", value))
}

fn append_provenance(match_reason: &mut Option<String>) {
    let reason = match_reason.get_or_insert_with(String::new);
    if reason.contains(PROVENANCE_MARKER) {
        return;
    }
    if !reason.is_empty() {
        reason.push(' ');
    }
    reason.push_str(PROVENANCE_MARKER);
}

fn apply_nutrition(recipe: &mut Recipe, nutrition: &AggregateNutrition) {
    recipe.calories = Some(nutrition.calories);
    recipe.macros = Some(Macros {
        protein: grams(nutrition.protein_g),
        carbs: grams(nutrition.carbohydrate_g),
        fat: grams(nutrition.fat_g),
    });
    // Estimated numbers go out unannotated so they read like the model's own guess.
    if nutrition.source == NutritionSource::External {
        append_provenance(&mut recipe.match_reason);
    }
}

/// Replaces model-guessed macros with looked-up ones.
#[derive(Clone)]
pub struct RecipeEnricher {
    aggregator: NutritionAggregator,
}

impl RecipeEnricher {
    pub fn new(aggregator: NutritionAggregator) -> Self {
        Self { aggregator }
    }

    pub async fn enrich(&self, recipe: Recipe) -> Recipe {
        self.enrich_detailed(recipe).await.recipe
    }

    /// Never fails. Recipes without ingredients, or whose aggregation
    /// panics, come back exactly as they went in.
    pub async fn enrich_detailed(&self, mut recipe: Recipe) -> EnrichmentOutcome {
        if recipe.ingredients().is_empty() {
            return EnrichmentOutcome {
                recipe,
                nutrition: None,
            };
        }

        let aggregation = AssertUnwindSafe(self.aggregator.aggregate(recipe.ingredients()))
            .catch_unwind()
            .await;

        match aggregation {
            Ok(nutrition) => {
                apply_nutrition(&mut recipe, &nutrition);
                info!(
                    recipe_id = %recipe.id,
                    source = ?nutrition.source,
                    confidence = nutrition.confidence,
                    calories = nutrition.calories,
                    "recipe nutrition enriched"
                );
                EnrichmentOutcome {
                    recipe,
                    nutrition: Some(nutrition),
                }
            }
            Err(_) => {
                warn!(recipe_id = %recipe.id, "nutrition enrichment aborted, keeping model estimate");
                EnrichmentOutcome {
                    recipe,
                    nutrition: None,
                }
            }
        }
    }

    /// Enriches all recipes concurrently. Output order matches input order.
    pub async fn enrich_batch(&self, recipes: Vec<Recipe>) -> Vec<Recipe> {
        self.enrich_batch_detailed(recipes)
            .await
            .into_iter()
            .map(|outcome| outcome.recipe)
            .collect()
    }

    pub async fn enrich_batch_detailed(&self, recipes: Vec<Recipe>) -> Vec<EnrichmentOutcome> {
        join_all(recipes.into_iter().map(|recipe| self.enrich_detailed(recipe))).await
    }
}

/// Either a single recipe object or an array of them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RecipeInput {
    Many(Vec<Recipe>),
    One(Box<Recipe>),
}

impl RecipeInput {
    pub fn into_recipes(self) -> Vec<Recipe> {
        match self {
            RecipeInput::Many(recipes) => recipes,
            RecipeInput::One(recipe) => vec![*recipe],
        }
    }
}

pub async fn load_recipes(path: &Path) -> Result<RecipeInput> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read recipe file '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse recipe JSON in '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition_lookup::{LookupOutcome, NutritionLookup};
    use crate::recipe_aggregator::NutritionSample;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct PanickingLookup;

    #[async_trait]
    impl NutritionLookup for PanickingLookup {
        async fn resolve(&self, _ingredient_name: &str) -> LookupOutcome {
            panic!("lookup blew up");
        }
    }

    struct EggLookup;

    #[async_trait]
    impl NutritionLookup for EggLookup {
        async fn resolve(&self, ingredient_name: &str) -> LookupOutcome {
            if ingredient_name != "egg" {
                return LookupOutcome::NoMatch;
            }
            LookupOutcome::Found(NutritionSample {
                calories: 72.0,
                protein_g: 6.3,
                carbohydrate_g: 0.4,
                fat_g: 4.8,
                source: NutritionSource::External,
                confidence: 85,
            })
        }
    }

    fn enricher(lookup: impl NutritionLookup + 'static) -> RecipeEnricher {
        RecipeEnricher::new(NutritionAggregator::new(Arc::new(lookup)))
    }

    fn grams_macros(protein: &str, carbs: &str, fat: &str) -> Option<Macros> {
        Some(Macros {
            protein: Some(protein.to_string()),
            carbs: Some(carbs.to_string()),
            fat: Some(fat.to_string()),
        })
    }

    fn draft(ingredients: &[&str]) -> Recipe {
        Recipe {
            id: "r1".to_string(),
            name: "Omelette".to_string(),
            match_reason: Some("Uses your eggs".to_string()),
            calories: Some(999),
            ingredients: Some(ingredients.iter().map(|s| s.to_string()).collect()),
            macros: grams_macros("50g", "50g", "50g"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn external_result_overwrites_macros_and_appends_marker() {
        let outcome = enricher(EggLookup).enrich_detailed(draft(&["egg"])).await;
        let recipe = outcome.recipe;
        assert_eq!(recipe.calories, Some(72));
        assert_eq!(recipe.macros, grams_macros("6g", "0g", "5g"));
        assert_eq!(
            recipe.match_reason,
            Some(format!("Uses your eggs {}", PROVENANCE_MARKER))
        );
        assert_eq!(recipe.ingredients(), ["egg".to_string()]);
        assert_eq!(outcome.nutrition.map(|n| n.source), Some(NutritionSource::External));
    }

    #[tokio::test]
    async fn estimated_result_overwrites_macros_silently() {
        let recipe = enricher(EggLookup).enrich(draft(&["flour", "sugar"])).await;
        assert_eq!(recipe.calories, Some(100));
        assert_eq!(recipe.macros, grams_macros("6g", "16g", "4g"));
        assert_eq!(recipe.match_reason.as_deref(), Some("Uses your eggs"));
    }

    #[tokio::test]
    async fn recipe_without_ingredients_is_untouched() {
        let original = draft(&[]);
        let outcome = enricher(EggLookup).enrich_detailed(original.clone()).await;
        assert_eq!(outcome.recipe, original);
        assert!(outcome.nutrition.is_none());
    }

    #[tokio::test]
    async fn minimal_recipe_serializes_back_to_the_same_json() {
        let input = serde_json::json!({"id": "min", "name": "Toast"});
        let recipe: Recipe = serde_json::from_value(input.clone()).unwrap();
        let recipe = enricher(EggLookup).enrich(recipe).await;
        assert_eq!(serde_json::to_value(&recipe).unwrap(), input);
    }

    #[tokio::test]
    async fn enrichment_adds_only_the_nutrition_fields() {
        let input = serde_json::json!({"id": "e", "name": "Boiled egg", "ingredients": ["egg"]});
        let recipe: Recipe = serde_json::from_value(input).unwrap();
        let output = serde_json::to_value(enricher(EggLookup).enrich(recipe).await).unwrap();
        let mut keys: Vec<&str> = output.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["calories", "id", "ingredients", "macros", "matchReason", "name"]);
        assert_eq!(output["matchReason"], PROVENANCE_MARKER);
    }

    #[tokio::test]
    async fn panicking_lookup_keeps_the_original_recipe() {
        let original = draft(&["egg"]);
        let outcome = enricher(PanickingLookup).enrich_detailed(original.clone()).await;
        assert_eq!(outcome.recipe, original);
        assert!(outcome.nutrition.is_none());
    }

    #[test]
    fn marker_goes_on_empty_reason_without_leading_space() {
        let mut reason = None;
        append_provenance(&mut reason);
        assert_eq!(reason.as_deref(), Some(PROVENANCE_MARKER));
        append_provenance(&mut reason);
        assert_eq!(reason.as_deref(), Some(PROVENANCE_MARKER));

        let mut empty = Some(String::new());
        append_provenance(&mut empty);
        assert_eq!(empty.as_deref(), Some(PROVENANCE_MARKER));
    }

    #[test]
    fn loose_numbers_are_rounded_not_rejected() {
        let recipe: Recipe = serde_json::from_str(
            r#"{"id": "a", "name": "A", "calories": 450.5, "timeMinutes": "20 min"}"#,
        )
        .unwrap();
        assert_eq!(recipe.calories, Some(451));
        assert_eq!(recipe.time_minutes, Some(20));

        let recipe: Recipe =
            serde_json::from_str(r#"{"id": "a", "name": "A", "calories": -12.4, "timeMinutes": null}"#)
                .unwrap();
        assert_eq!(recipe.calories, Some(0));
        assert_eq!(recipe.time_minutes, None);

        let recipe: Recipe =
            serde_json::from_str(r#"{"id": "a", "name": "A", "calories": "lots"}"#).unwrap();
        assert_eq!(recipe.calories, None);
    }

    #[test]
    fn recipe_round_trips_unknown_fields() {
        let json = r#"{
            "id": "abc",
            "name": "Fried rice",
            "description": "Quick",
            "matchScore": 92,
            "matchReason": "Uses leftovers",
            "calories": 450,
            "timeMinutes": 15,
            "tags": ["quick"],
            "ingredients": ["rice", "egg"],
            "instructions": ["Fry"],
            "macros": {"protein": "12g", "carbs": "60g", "fat": "14g"},
            "healthTip": "Add greens",
            "imageUrl": "https://example.test/x.png"
        }"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.match_score, Some(92.0));
        assert_eq!(recipe.time_minutes, Some(15));
        assert_eq!(recipe.extra.get("imageUrl").and_then(Value::as_str), Some("https://example.test/x.png"));

        let back = serde_json::to_value(&recipe).unwrap();
        assert_eq!(back["imageUrl"], "https://example.test/x.png");
        assert_eq!(back["matchReason"], "Uses leftovers");
        assert_eq!(back["healthTip"], "Add greens");
        assert_eq!(back["calories"], 450);
    }

    #[test]
    fn input_accepts_object_or_array() {
        let one: RecipeInput = serde_json::from_str(r#"{"id": "a", "name": "A"}"#).unwrap();
        assert_eq!(one.into_recipes().len(), 1);
        let many: RecipeInput =
            serde_json::from_str(r#"[{"id": "a", "name": "A"}, {"id": "b", "name": "B"}]"#).unwrap();
        let recipes = many.into_recipes();
        assert_eq!(recipes[1].id, "b");
    }
}
