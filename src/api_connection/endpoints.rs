use serde::{Deserialize, Serialize};

pub const FOOD_DATA_CENTRAL_BASE_URL: &str = "https://api.nal.usda.gov/fdc/v1";
pub const FOOD_SEARCH_PATH: &str = "/foods/search";

/// Reference-food categories only. Branded entries are too noisy for recipe math.
pub const REFERENCE_DATA_TYPES: &[&str] = &["Foundation", "SR Legacy"];

pub const NUTRIENT_ENERGY_KCAL: u32 = 1008;
pub const NUTRIENT_PROTEIN: u32 = 1003;
pub const NUTRIENT_FAT: u32 = 1004;
pub const NUTRIENT_CARBOHYDRATE: u32 = 1005;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoodSearchRequest {
    pub query: String,
    pub page_size: u32,
    pub data_types: Vec<String>,
}

impl FoodSearchRequest {
    /// Single best match restricted to reference foods.
    pub fn best_reference_match(query: &str) -> Self {
        Self {
            query: query.to_string(),
            page_size: 1,
            data_types: REFERENCE_DATA_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn query_pairs(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("api_key", api_key.to_string()),
            ("query", self.query.clone()),
            ("pageSize", self.page_size.to_string()),
            ("dataType", self.data_types.join(",")),
        ]
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FoodSearchResponse {
    #[serde(default)]
    pub foods: Vec<FoodItem>,
    #[serde(rename = "totalHits", default)]
    pub total_hits: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FoodItem {
    #[serde(rename = "fdcId", default)]
    pub fdc_id: u64,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "dataType", default)]
    pub data_type: Option<String>,
    #[serde(rename = "foodNutrients", default)]
    pub food_nutrients: Vec<FoodNutrientEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FoodNutrientEntry {
    #[serde(rename = "nutrientId", default)]
    pub nutrient_id: Option<u32>,
    #[serde(rename = "nutrientNumber", default)]
    pub nutrient_number: Option<NutrientNumber>,
    #[serde(rename = "nutrientName", default)]
    pub nutrient_name: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(rename = "unitName", default)]
    pub unit_name: Option<String>,
}

/// The search API has shipped this field both as a JSON string and a number.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum NutrientNumber {
    Numeric(u32),
    Text(String),
}

impl NutrientNumber {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            NutrientNumber::Numeric(n) => Some(*n),
            NutrientNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl FoodNutrientEntry {
    pub fn matches(&self, identifier: u32) -> bool {
        self.nutrient_number.as_ref().and_then(NutrientNumber::as_u32) == Some(identifier)
            || self.nutrient_id == Some(identifier)
    }
}

impl FoodItem {
    /// Value of the first entry carrying `identifier`; absent or non-finite values read as 0.
    pub fn nutrient_value(&self, identifier: u32) -> f64 {
        self.food_nutrients
            .iter()
            .find(|n| n.matches(identifier))
            .and_then(|n| n.value)
            .filter(|v| v.is_finite())
            .map(|v| v.max(0.0))
            .unwrap_or(0.0)
    }
}
