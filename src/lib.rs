pub mod api_connection;
pub mod cli;
pub mod config;
pub mod fallback_estimator;
pub mod ingredient_normalizer;
pub mod logging;
pub mod nutrition_lookup;
pub mod recipe_aggregator;
pub mod recipe_enricher;
