use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::fallback_estimator::estimate;
use crate::ingredient_normalizer::normalize;
use crate::nutrition_lookup::NutritionLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NutritionSource {
    External,
    Estimated,
}

/// One ingredient's resolved nutrition, roughly one reference serving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionSample {
    pub calories: f64,
    pub protein_g: f64,
    pub carbohydrate_g: f64,
    pub fat_g: f64,
    pub source: NutritionSource,
    pub confidence: u8,
}

/// Recipe-level totals, rounded to whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateNutrition {
    pub calories: u32,
    pub protein_g: u32,
    pub carbohydrate_g: u32,
    pub fat_g: u32,
    pub source: NutritionSource,
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, Default)]
struct NutritionTotals {
    calories: f64,
    protein_g: f64,
    carbohydrate_g: f64,
    fat_g: f64,
}

impl NutritionTotals {
    fn add(&mut self, sample: &NutritionSample) {
        macro_rules! add_non_negative {
            ($field:ident) => {
                if sample.$field.is_finite() && sample.$field > 0.0 {
                    self.$field += sample.$field;
                }
            };
        }
        add_non_negative!(calories);
        add_non_negative!(protein_g);
        add_non_negative!(carbohydrate_g);
        add_non_negative!(fat_g);
    }
}

fn round_to_u32(value: f64) -> u32 {
    // `as` saturates, so huge sums clamp to u32::MAX.
    value.round().max(0.0) as u32
}

fn resolved_percentage(resolved: usize, total: usize) -> u8 {
    let percentage = (100.0 * resolved as f64 / total as f64).round();
    percentage.clamp(0.0, 100.0) as u8
}

/// Fans ingredient lookups out concurrently and folds the hits into one total.
#[derive(Clone)]
pub struct NutritionAggregator {
    lookup: Arc<dyn NutritionLookup>,
}

impl NutritionAggregator {
    pub fn new(lookup: Arc<dyn NutritionLookup>) -> Self {
        Self { lookup }
    }

    /// Never fails: if nothing resolves externally the whole result comes
    /// from the estimator, otherwise only external samples are summed.
    pub async fn aggregate(&self, ingredients: &[String]) -> AggregateNutrition {
        if ingredients.is_empty() {
            return estimate(0);
        }

        let lookups = ingredients.iter().map(|raw| {
            let canonical = normalize(raw);
            let lookup = Arc::clone(&self.lookup);
            async move { lookup.lookup(&canonical).await }
        });
        let samples: Vec<NutritionSample> = join_all(lookups)
            .await
            .into_iter()
            .flatten()
            .filter(|sample| sample.source == NutritionSource::External)
            .collect();

        if samples.is_empty() {
            debug!(
                ingredient_count = ingredients.len(),
                "no ingredient resolved externally, using estimator"
            );
            return estimate(ingredients.len());
        }

        let mut totals = NutritionTotals::default();
        for sample in &samples {
            totals.add(sample);
        }

        let confidence = resolved_percentage(samples.len(), ingredients.len());
        debug!(
            resolved = samples.len(),
            ingredient_count = ingredients.len(),
            confidence,
            "aggregated external nutrition"
        );

        AggregateNutrition {
            calories: round_to_u32(totals.calories),
            protein_g: round_to_u32(totals.protein_g),
            carbohydrate_g: round_to_u32(totals.carbohydrate_g),
            fat_g: round_to_u32(totals.fat_g),
            source: NutritionSource::External,
            confidence,
        }
    }
}
