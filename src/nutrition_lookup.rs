//! Single-ingredient nutrition lookups against a food-composition database.
//!
//! Nothing here returns an error to the caller. A lookup resolves to a
//! [`LookupOutcome`], and every outcome other than `Found` reads as "not
//! found" to the aggregator. One unrecognisable ingredient must never abort
//! a recipe's enrichment.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::api_connection::connection::{
    FoodDataCentralTransport, FoodSearchError, FoodSearchTransport,
};
use crate::api_connection::endpoints::{
    FoodItem, FoodSearchRequest, NUTRIENT_CARBOHYDRATE, NUTRIENT_ENERGY_KCAL, NUTRIENT_FAT,
    NUTRIENT_PROTEIN,
};
use crate::config::EnrichmentConfig;
use crate::recipe_aggregator::{NutritionSample, NutritionSource};

/// Trust in the reference database as a whole, not in the individual match.
pub const EXTERNAL_CONFIDENCE: u8 = 85;

/// How a single lookup ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(NutritionSample),
    /// The database answered and had no reference food for the name.
    NoMatch,
    /// No credential; the database was never contacted.
    NotConfigured,
    /// Transport failure, timeout, rejected request or unreadable body.
    Unavailable,
}

impl LookupOutcome {
    pub fn into_sample(self) -> Option<NutritionSample> {
        match self {
            LookupOutcome::Found(sample) => Some(sample),
            _ => None,
        }
    }

    /// Only answers the database actually gave are worth remembering.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, LookupOutcome::Found(_) | LookupOutcome::NoMatch)
    }
}

#[async_trait]
pub trait NutritionLookup: Send + Sync {
    async fn resolve(&self, ingredient_name: &str) -> LookupOutcome;

    async fn lookup(&self, ingredient_name: &str) -> Option<NutritionSample> {
        self.resolve(ingredient_name).await.into_sample()
    }
}

impl NutritionSample {
    pub fn from_food_item(food: &FoodItem) -> Self {
        Self {
            calories: food.nutrient_value(NUTRIENT_ENERGY_KCAL),
            protein_g: food.nutrient_value(NUTRIENT_PROTEIN),
            carbohydrate_g: food.nutrient_value(NUTRIENT_CARBOHYDRATE),
            fat_g: food.nutrient_value(NUTRIENT_FAT),
            source: NutritionSource::External,
            confidence: EXTERNAL_CONFIDENCE,
        }
    }
}

/// Looks ingredients up in USDA FoodData Central.
pub struct FoodDataLookup {
    api_key: Option<String>,
    transport: Arc<dyn FoodSearchTransport>,
    timeout: Duration,
}

impl FoodDataLookup {
    pub fn new(
        api_key: Option<String>,
        transport: Arc<dyn FoodSearchTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            transport,
            timeout,
        }
    }

    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, FoodSearchError> {
        let transport = FoodDataCentralTransport::new(&config.base_url, config.lookup_timeout)?;
        Ok(Self::new(
            config.api_key.clone(),
            Arc::new(transport),
            config.lookup_timeout,
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn best_match(
        &self,
        ingredient_name: &str,
        api_key: &str,
    ) -> Result<Option<FoodItem>, FoodSearchError> {
        let request = FoodSearchRequest::best_reference_match(ingredient_name);
        // The reqwest client has its own timeout; this one also covers other transports.
        let response = tokio::time::timeout(self.timeout, self.transport.search_foods(&request, api_key))
            .await
            .map_err(|_| FoodSearchError::TimedOut(self.timeout))??;

        Ok(response.foods.into_iter().next())
    }
}

#[async_trait]
impl NutritionLookup for FoodDataLookup {
    async fn resolve(&self, ingredient_name: &str) -> LookupOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return LookupOutcome::NotConfigured;
        };

        match self.best_match(ingredient_name, api_key).await {
            Ok(Some(food)) => {
                debug!(
                    ingredient = ingredient_name,
                    fdc_id = food.fdc_id,
                    matched = %food.description,
                    "nutrition lookup matched"
                );
                LookupOutcome::Found(NutritionSample::from_food_item(&food))
            }
            Ok(None) => {
                debug!(ingredient = ingredient_name, "nutrition lookup found no reference food");
                LookupOutcome::NoMatch
            }
            Err(err) => {
                warn!(
                    ingredient = ingredient_name,
                    status = ?err.status(),
                    error = %err,
                    "nutrition lookup failed"
                );
                LookupOutcome::Unavailable
            }
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: LookupOutcome,
    expires_at: Instant,
}

/// Memoises another lookup by lowercase canonical name.
///
/// Matches and definite misses are kept for `ttl`; `NotConfigured` and
/// `Unavailable` are never stored, so the next call asks again. Concurrent
/// callers for the same key share one upstream request. Expired entries are
/// swept whenever a new one is written.
pub struct CachingLookup<L> {
    inner: L,
    entries: RwLock<HashMap<String, CacheEntry>>,
    in_flight: Mutex<HashMap<String, Arc<OnceCell<LookupOutcome>>>>,
    ttl: Duration,
}

impl<L: NutritionLookup> CachingLookup<L> {
    pub fn new(inner: L, ttl: Duration) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn fresh(&self, key: &str) -> Option<LookupOutcome> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.outcome.clone())
    }

    async fn store(&self, key: String, outcome: LookupOutcome) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key,
            CacheEntry {
                outcome,
                expires_at: now + self.ttl,
            },
        );
    }
}

#[async_trait]
impl<L: NutritionLookup> NutritionLookup for CachingLookup<L> {
    async fn resolve(&self, ingredient_name: &str) -> LookupOutcome {
        let key = ingredient_name.trim().to_lowercase();
        if let Some(outcome) = self.fresh(&key).await {
            return outcome;
        }

        let cell = self
            .in_flight
            .lock()
            .await
            .entry(key.clone())
            .or_default()
            .clone();

        let outcome = cell
            .get_or_init(|| async {
                // A request that finished between the check above and joining the cell.
                match self.fresh(&key).await {
                    Some(outcome) => outcome,
                    None => self.inner.resolve(ingredient_name).await,
                }
            })
            .await
            .clone();

        if outcome.is_cacheable() {
            self.store(key.clone(), outcome.clone()).await;
        }

        // Stored before the cell is released, so later callers hit the cache.
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(&key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            in_flight.remove(&key);
        }
        outcome
    }
}
