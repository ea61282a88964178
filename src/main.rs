use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use recipe_enrich::cli::parse_args;
use recipe_enrich::config::{EnrichmentConfig, API_KEY_ENV_VAR};
use recipe_enrich::logging::init_logging;
use recipe_enrich::nutrition_lookup::{CachingLookup, FoodDataLookup, NutritionLookup};
use recipe_enrich::recipe_aggregator::NutritionAggregator;
use recipe_enrich::recipe_enricher::{load_recipes, EnrichmentOutcome, RecipeEnricher, RecipeInput};

fn build_lookup(config: &EnrichmentConfig) -> Result<Arc<dyn NutritionLookup>> {
    let lookup = FoodDataLookup::from_config(config)
        .context("Failed to build FoodData Central client")?;
    let lookup: Arc<dyn NutritionLookup> = if config.cache_enabled {
        Arc::new(CachingLookup::new(lookup, config.cache_ttl))
    } else {
        Arc::new(lookup)
    };
    Ok(lookup)
}

fn report(outcomes: &[EnrichmentOutcome]) {
    for outcome in outcomes {
        match &outcome.nutrition {
            Some(n) => info!(
                recipe = %outcome.recipe.name,
                source = ?n.source,
                confidence = n.confidence,
                calories = n.calories,
                protein_g = n.protein_g,
                carbohydrate_g = n.carbohydrate_g,
                fat_g = n.fat_g,
                "nutrition report"
            ),
            None => info!(recipe = %outcome.recipe.name, "nutrition report: enrichment skipped"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = parse_args();
    init_logging(&cli_args.log_level)?;

    let config = EnrichmentConfig::from_env();
    if !config.has_api_key() {
        warn!(
            "{} is not set; nutrition will be estimated from ingredient counts",
            API_KEY_ENV_VAR
        );
    }

    let enricher = RecipeEnricher::new(NutritionAggregator::new(build_lookup(&config)?));

    info!(path = %cli_args.recipe_file.display(), "reading recipes");
    let input = load_recipes(&cli_args.recipe_file).await?;
    let single = matches!(input, RecipeInput::One(_));

    let outcomes = enricher.enrich_batch_detailed(input.into_recipes()).await;
    if cli_args.report {
        report(&outcomes);
    }

    let recipes: Vec<_> = outcomes.into_iter().map(|outcome| outcome.recipe).collect();
    let output = match (single, recipes.as_slice()) {
        (true, [recipe]) => serde_json::to_string_pretty(recipe),
        _ => serde_json::to_string_pretty(&recipes),
    }
    .context("Failed to serialize enriched recipes")?;

    println!("{}", output);
    Ok(())
}
