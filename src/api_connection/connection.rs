use async_trait::async_trait;
use reqwest::Client;
use std::error::Error;
use std::fmt;
use std::time::Duration;

use super::endpoints::{FoodSearchRequest, FoodSearchResponse, FOOD_SEARCH_PATH};

/// Why a food search produced no usable response. Every variant is treated
/// as transient by the lookup layer.
#[derive(Debug)]
pub enum FoodSearchError {
    Transport(reqwest::Error),
    TimedOut(Duration),
    MalformedBody(serde_json::Error),
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl FoodSearchError {
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            FoodSearchError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for FoodSearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoodSearchError::Transport(err) => write!(f, "food search request failed: {}", err),
            FoodSearchError::TimedOut(after) => write!(f, "food search timed out after {:?}", after),
            FoodSearchError::MalformedBody(err) => {
                write!(f, "food search returned malformed JSON: {}", err)
            }
            FoodSearchError::Rejected { status, body } if body.is_empty() => {
                write!(f, "food search rejected with {}", status)
            }
            FoodSearchError::Rejected { status, body } => {
                write!(f, "food search rejected with {}: {}", status, body)
            }
        }
    }
}

impl Error for FoodSearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FoodSearchError::Transport(err) => Some(err),
            FoodSearchError::MalformedBody(err) => Some(err),
            FoodSearchError::TimedOut(_) | FoodSearchError::Rejected { .. } => None,
        }
    }
}

impl From<serde_json::Error> for FoodSearchError {
    fn from(err: serde_json::Error) -> Self {
        FoodSearchError::MalformedBody(err)
    }
}

/// One round trip to a food-composition search endpoint.
///
/// Kept behind a trait so the lookup layer can be exercised without a network.
#[async_trait]
pub trait FoodSearchTransport: Send + Sync {
    async fn search_foods(
        &self,
        request: &FoodSearchRequest,
        api_key: &str,
    ) -> Result<FoodSearchResponse, FoodSearchError>;
}

/// reqwest-backed transport for the USDA FoodData Central search API.
#[derive(Debug, Clone)]
pub struct FoodDataCentralTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl FoodDataCentralTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FoodSearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FoodSearchError::Transport)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn search_url(&self) -> String {
        format!("{}{}", self.base_url, FOOD_SEARCH_PATH)
    }

    fn classify(&self, err: reqwest::Error) -> FoodSearchError {
        if err.is_timeout() {
            FoodSearchError::TimedOut(self.timeout)
        } else {
            FoodSearchError::Transport(err)
        }
    }
}

#[async_trait]
impl FoodSearchTransport for FoodDataCentralTransport {
    async fn search_foods(
        &self,
        request: &FoodSearchRequest,
        api_key: &str,
    ) -> Result<FoodSearchResponse, FoodSearchError> {
        let response = self
            .client
            .get(self.search_url())
            .query(&request.query_pairs(api_key))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if response.status().is_success() {
            // Read the body first so malformed JSON surfaces as a serde error, not a reqwest one.
            let body = response.text().await.map_err(|e| self.classify(e))?;
            let search_response = serde_json::from_str::<FoodSearchResponse>(&body)?;
            Ok(search_response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(FoodSearchError::Rejected { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_ignores_trailing_slash() {
        let transport =
            FoodDataCentralTransport::new("https://example.test/fdc/v1/", Duration::from_secs(2))
                .unwrap();
        assert_eq!(transport.search_url(), "https://example.test/fdc/v1/foods/search");
    }

    #[test]
    fn rejection_display_includes_status_and_body() {
        let err = FoodSearchError::Rejected {
            status: reqwest::StatusCode::FORBIDDEN,
            body: "bad key".to_string(),
        };
        assert_eq!(err.to_string(), "food search rejected with 403 Forbidden: bad key");
        assert_eq!(err.status(), Some(reqwest::StatusCode::FORBIDDEN));

        let bare = FoodSearchError::Rejected {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        };
        assert_eq!(bare.to_string(), "food search rejected with 503 Service Unavailable");
    }

    #[test]
    fn timeouts_report_the_limit_and_carry_no_status() {
        let err = FoodSearchError::TimedOut(Duration::from_secs(5));
        assert_eq!(err.to_string(), "food search timed out after 5s");
        assert!(err.status().is_none());
        assert!(err.source().is_none());
    }

    #[test]
    fn serde_failures_keep_their_source() {
        let parse_err = serde_json::from_str::<FoodSearchResponse>("not json").unwrap_err();
        let err = FoodSearchError::from(parse_err);
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("food search returned malformed JSON"));
    }
}
