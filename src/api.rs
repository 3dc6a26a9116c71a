//! Wire format of the classifieds filter API and the HTTP seam used to reach it.

use crate::error::{CarsError, Result};
use crate::models::{Listing, ResolvedIdentifiers, NO_BODY_TYPE};
use crate::debug_eprintln;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Internal id of the `brands` filter property.
const BRANDS_PROPERTY: i64 = 1440;
/// `price_currency` selector value for USD.
const USD_CURRENCY: i64 = 2;

/// Raw HTTP answer; status interpretation is left to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            reason: "OK".to_string(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport {
    fn get(&self, url: &str) -> Result<HttpReply>;
    fn post_json(&self, url: &str, payload: &Value) -> Result<HttpReply>;
}

/// Blocking `reqwest` transport. Timeouts are left to the client configuration.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }

    fn reply(response: reqwest::blocking::Response) -> Result<HttpReply> {
        let status = response.status();
        let body = response.text()?;
        Ok(HttpReply {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<HttpReply> {
        debug_eprintln!("GET {}", url);
        let response = self.client.get(url).send()?;
        Self::reply(response)
    }

    fn post_json(&self, url: &str, payload: &Value) -> Result<HttpReply> {
        debug_eprintln!("POST {} {}", url, payload);
        let response = self.client.post(url).json(payload).send()?;
        Self::reply(response)
    }
}

fn brands_property(vendor_id: i64, model_id: Option<i64>, generation_id: Option<i64>, scoping: bool) -> Value {
    let mut selection = vec![if scoping && model_id.is_none() {
        json!({"name": "brand", "value": vendor_id, "modified": true, "previousValue": null})
    } else {
        json!({"name": "brand", "value": vendor_id})
    }];
    if let Some(model_id) = model_id {
        selection.push(json!({"name": "model", "value": model_id, "modified": true, "previousValue": null}));
    }
    if let Some(generation_id) = generation_id {
        selection.push(json!({"name": "generation", "value": generation_id, "modified": true, "previousValue": null}));
    }

    json!({
        "modified": true,
        "name": "brands",
        "property": BRANDS_PROPERTY,
        "value": [selection],
    })
}

fn currency_property() -> Value {
    json!({"name": "price_currency", "value": USD_CURRENCY})
}

/// Full filter for one listing page; the API keeps no state between pages.
pub fn filter_payload(page: u32, ids: &ResolvedIdentifiers) -> Value {
    let mut properties = vec![
        brands_property(ids.vendor_id, Some(ids.model_id), ids.generation_id, false),
        currency_property(),
    ];
    if !ids.body_type_ids.is_empty() {
        let body_types: Vec<i64> = ids.body_type_ids.iter().copied().collect();
        properties.push(json!({"name": "body_type", "value": body_types}));
    }

    json!({"page": page, "properties": properties})
}

/// Filter update that makes the API return the models of a vendor.
pub fn models_payload(vendor_id: i64) -> Value {
    json!({"properties": [brands_property(vendor_id, None, None, true), currency_property()]})
}

/// Filter update that makes the API return the generations of a model.
pub fn generations_payload(vendor_id: i64, model_id: i64) -> Value {
    json!({"properties": [brands_property(vendor_id, Some(model_id), None, true), currency_property()]})
}

/// Extracts the `label -> intValue` vocabulary of `child` ("model" or "generation")
/// from a filter update response.
pub fn child_options(response: &Value, child: &str) -> Result<Vec<(String, i64)>> {
    let fields = response
        .pointer("/properties/0/value/0")
        .and_then(Value::as_array)
        .ok_or_else(|| CarsError::UnexpectedResponse("missing brands selection".to_string()))?;

    let field = fields
        .iter()
        .find(|field| field.get("name").and_then(Value::as_str) == Some(child))
        .ok_or_else(|| CarsError::UnexpectedResponse(format!("no {} field in brands selection", child)))?;

    let options = field
        .get("options")
        .and_then(Value::as_array)
        .ok_or_else(|| CarsError::UnexpectedResponse(format!("no options for {}", child)))?;

    Ok(options
        .iter()
        .filter_map(|option| {
            let label = option.get("label")?.as_str()?;
            let id = option.get("intValue")?.as_i64()?;
            Some((label.to_string(), id))
        })
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResponse {
    pub page_count: u32,
    #[serde(default)]
    pub adverts: Vec<Advert>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advert {
    pub price: AdvertPrice,
    pub year: i32,
    pub public_url: String,
    pub original_days_on_sale: i64,
    #[serde(default)]
    pub properties: Vec<AdvertProperty>,
}

#[derive(Debug, Deserialize)]
pub struct AdvertPrice {
    pub usd: PriceAmount,
}

#[derive(Debug, Deserialize)]
pub struct PriceAmount {
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdvertProperty {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl Advert {
    pub fn body_type(&self) -> String {
        self.properties
            .iter()
            .find(|property| property.name == "body_type")
            .map(|property| match &property.value {
                Value::String(text) => text.clone(),
                Value::Null => NO_BODY_TYPE.to_string(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| NO_BODY_TYPE.to_string())
    }

    pub fn into_listing(self) -> Listing {
        let body_type = self.body_type();
        Listing {
            price: self.price.usd.amount,
            year: self.year,
            url: self.public_url,
            days_on_sale: self.original_days_on_sale,
            body_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    #[test]
    fn test_filter_payload_with_generation_and_body_types() {
        let ids = ResolvedIdentifiers {
            vendor_id: 1181,
            model_id: 1191,
            generation_id: Some(4322),
            body_type_ids: BTreeSet::from([5, 1]),
        };

        let payload = filter_payload(3, &ids);

        assert_eq!(payload["page"], json!(3));
        assert_eq!(
            payload["properties"][0]["value"][0],
            json!([
                {"name": "brand", "value": 1181},
                {"name": "model", "value": 1191, "modified": true, "previousValue": null},
                {"name": "generation", "value": 4322, "modified": true, "previousValue": null},
            ])
        );
        assert_eq!(payload["properties"][1], json!({"name": "price_currency", "value": 2}));
        assert_eq!(payload["properties"][2], json!({"name": "body_type", "value": [1, 5]}));
    }

    #[test]
    fn test_unfiltered_payload_has_no_optional_parts() {
        let ids = ResolvedIdentifiers {
            vendor_id: 1,
            model_id: 2,
            generation_id: None,
            body_type_ids: BTreeSet::new(),
        };

        let payload = filter_payload(1, &ids);

        assert_eq!(payload["properties"].as_array().unwrap().len(), 2);
        assert_eq!(payload["properties"][0]["value"][0].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_models_payload_marks_brand_modified() {
        let payload = models_payload(1181);
        assert_eq!(
            payload["properties"][0]["value"],
            json!([[{"name": "brand", "value": 1181, "modified": true, "previousValue": null}]])
        );
        assert!(payload.get("page").is_none());
    }

    #[test]
    fn test_child_options_finds_field_by_name() {
        let response = json!({
            "properties": [{
                "name": "brands",
                "value": [[
                    {"name": "brand", "value": 1181},
                    {"name": "model", "options": [
                        {"label": "Camry", "intValue": 1191},
                        {"label": "Corolla", "intValue": 1193},
                        {"label": "Broken"}
                    ]}
                ]]
            }]
        });

        let options = child_options(&response, "model").unwrap();

        assert_eq!(
            options,
            vec![("Camry".to_string(), 1191), ("Corolla".to_string(), 1193)]
        );
        assert!(matches!(
            child_options(&response, "generation"),
            Err(CarsError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_advert_without_body_type_gets_placeholder() {
        let advert: Advert = serde_json::from_value(json!({
            "price": {"usd": {"amount": 15400}},
            "year": 2017,
            "publicUrl": "https://cars.av.by/toyota/camry/100",
            "originalDaysOnSale": 12,
            "properties": [{"name": "mileage_km", "value": 120000}]
        }))
        .unwrap();

        let listing = advert.into_listing();

        assert_eq!(listing.body_type, "-");
        assert_eq!(listing.price, 15400);
        assert_eq!(listing.days_on_sale, 12);
    }

    #[test]
    fn test_advert_body_type_is_read() {
        let advert: Advert = serde_json::from_value(json!({
            "price": {"usd": {"amount": 9000}},
            "year": 2012,
            "publicUrl": "https://cars.av.by/toyota/corolla/7",
            "originalDaysOnSale": 3,
            "properties": [{"name": "body_type", "value": "Седан"}]
        }))
        .unwrap();

        assert_eq!(advert.body_type(), "Седан");
    }
}
