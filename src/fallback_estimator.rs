use crate::recipe_aggregator::{AggregateNutrition, NutritionSource};

pub const ESTIMATED_CONFIDENCE: u8 = 30;

// Heuristic per-ingredient contribution. These are not measured values, just
// "an average ingredient adds a modest amount" in roughly sensible proportions.
const KCAL_PER_INGREDIENT: u32 = 50;
const PROTEIN_G_PER_INGREDIENT: u32 = 3;
const CARBOHYDRATE_G_PER_INGREDIENT: u32 = 8;
const FAT_G_PER_INGREDIENT: u32 = 2;

/// Low-confidence nutrition guess from the ingredient count alone.
pub fn estimate(ingredient_count: usize) -> AggregateNutrition {
    let count = u32::try_from(ingredient_count).unwrap_or(u32::MAX);
    AggregateNutrition {
        calories: count.saturating_mul(KCAL_PER_INGREDIENT),
        protein_g: count.saturating_mul(PROTEIN_G_PER_INGREDIENT),
        carbohydrate_g: count.saturating_mul(CARBOHYDRATE_G_PER_INGREDIENT),
        fat_g: count.saturating_mul(FAT_G_PER_INGREDIENT),
        source: NutritionSource::Estimated,
        confidence: ESTIMATED_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_linearly_with_ingredient_count() {
        let result = estimate(4);
        assert_eq!(result.calories, 200);
        assert_eq!(result.protein_g, 12);
        assert_eq!(result.carbohydrate_g, 32);
        assert_eq!(result.fat_g, 8);
        assert_eq!(result.source, NutritionSource::Estimated);
        assert_eq!(result.confidence, 30);
    }

    #[test]
    fn zero_ingredients_is_all_zero() {
        let result = estimate(0);
        assert_eq!(
            (result.calories, result.protein_g, result.carbohydrate_g, result.fat_g),
            (0, 0, 0, 0)
        );
        assert_eq!(result.source, NutritionSource::Estimated);
        assert_eq!(result.confidence, ESTIMATED_CONFIDENCE);
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        let result = estimate(usize::MAX);
        assert_eq!(result.calories, u32::MAX);
    }
}
