use crate::models::VehicleQuery;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_LANDING_URL: &str = "https://cars.av.by/";
pub const DEFAULT_HOST: &str = "https://api.av.by";
pub const DEFAULT_FILTER_REQUEST: &str = "/offer-types/cars/filters/main/apply";
pub const DEFAULT_MODELS_REQUEST: &str = "/offer-types/cars/filters/main/update";

/// Endpoints of the classifieds site.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub landing_url: String,
    pub host: String,
    pub filter_request: String,
    pub models_request: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            landing_url: DEFAULT_LANDING_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            filter_request: DEFAULT_FILTER_REQUEST.to_string(),
            models_request: DEFAULT_MODELS_REQUEST.to_string(),
        }
    }
}

impl ApiConfig {
    pub fn filter_url(&self) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), self.filter_request)
    }

    pub fn models_url(&self) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), self.models_request)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CarConfig {
    pub brand: String,
    pub model: String,
    #[serde(default)]
    pub generations: Vec<String>,
    #[serde(default)]
    pub body_types: Vec<String>,
}

impl CarConfig {
    /// One query per generation, or a single unfiltered one when none are listed.
    pub fn queries(&self) -> Vec<VehicleQuery> {
        let mut generations = self.generations.clone();
        if generations.is_empty() {
            generations.push(String::new());
        }
        generations.sort();
        generations.dedup();

        generations
            .iter()
            .map(|generation| {
                VehicleQuery::new(&self.brand, &self.model, generation)
                    .with_body_types(self.body_types.iter().cloned())
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cars: Vec<CarConfig>,
}

impl AppConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;
        Self::from_json(&text).context(format!("Invalid configuration file: {}", path.display()))
    }

    /// All queries of the run, sorted by brand, model and generation.
    pub fn queries(&self) -> Vec<VehicleQuery> {
        let mut queries: Vec<VehicleQuery> = self.cars.iter().flat_map(CarConfig::queries).collect();
        queries.sort();
        queries.dedup();
        queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_api_section_missing() {
        let config = AppConfig::from_json(r#"{"cars": [{"brand": "Toyota", "model": "Camry"}]}"#).unwrap();

        assert_eq!(config.api, ApiConfig::default());
        assert_eq!(
            config.api.filter_url(),
            "https://api.av.by/offer-types/cars/filters/main/apply"
        );
        assert_eq!(config.queries(), vec![VehicleQuery::new("Toyota", "Camry", "")]);
    }

    #[test]
    fn test_queries_are_expanded_and_sorted() {
        let config = AppConfig::from_json(
            r#"{
                "api": {"host": "http://localhost:8080/"},
                "cars": [
                    {"brand": "Toyota", "model": "RAV4", "body_types": ["Внедорожник 5 дв."]},
                    {"brand": "BMW", "model": "X5", "generations": ["G05", "E70"]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.api.models_url(), "http://localhost:8080/offer-types/cars/filters/main/update");
        let titles: Vec<String> = config.queries().iter().map(|q| q.sheet_title()).collect();
        assert_eq!(titles, vec!["BMW X5 E70", "BMW X5 G05", "Toyota RAV4"]);
        assert_eq!(config.queries()[2].body_types.len(), 1);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(AppConfig::from_json(r#"{"cars": [], "extra": 1}"#).is_err());
    }
}
