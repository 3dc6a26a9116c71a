//! Translates vendor, model, generation and body type names into the numeric ids the
//! filter API expects.
//!
//! Vendors and body types come from one scrape of the landing page. Models and
//! generations are only returned by the API once their parent is selected, so each
//! vocabulary is requested per vendor (or vendor + model) and cached for the run.

use crate::api::{child_options, generations_payload, models_payload, Transport};
use crate::config::ApiConfig;
use crate::error::{CarsError, Result};
use crate::models::{ResolvedIdentifiers, VehicleQuery};
use crate::{debug_eprintln, warn_eprintln};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

pub type Vocabulary = BTreeMap<String, i64>;

/// Marker preceding the serialized body type options on the landing page.
const BODY_TYPE_MARKER: &str = r#""name":"body_type""#;

fn brand_button_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| {
        Selector::parse(r#"button[data-property-name="brand"]"#).expect("valid brand selector")
    })
}

fn id_label_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#""id":(\d+),"label":"((?:[^"\\]|\\.)*)""#).expect("valid id/label regex")
    })
}

/// Builds a vocabulary, dropping every label that maps to more than one id.
pub fn index_labels<I>(pairs: I, domain: &str) -> Vocabulary
where
    I: IntoIterator<Item = (String, i64)>,
{
    let mut candidates: BTreeMap<String, BTreeSet<i64>> = BTreeMap::new();
    for (label, id) in pairs {
        candidates.entry(label).or_default().insert(id);
    }

    candidates
        .into_iter()
        .filter_map(|(label, ids)| {
            if ids.len() == 1 {
                ids.into_iter().next().map(|id| (label, id))
            } else {
                warn_eprintln!("Ambiguous {} id: {} - {:?}", domain, label, ids);
                None
            }
        })
        .collect()
}

fn unescape_json_string(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

/// Vendor vocabulary of the landing page: button labels matched against the
/// `"id":N,"label":"..."` pairs of the embedded filter state.
pub fn scrape_vendor_ids(html: &str) -> Vocabulary {
    let document = Html::parse_document(html);
    let names: BTreeSet<String> = document
        .select(brand_button_selector())
        .map(|button| button.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    debug_eprintln!("Found {} brand buttons", names.len());

    let pairs: Vec<(String, i64)> = id_label_regex()
        .captures_iter(html)
        .filter_map(|captures| {
            let id = captures.get(1)?.as_str().parse::<i64>().ok()?;
            let label = unescape_json_string(captures.get(2)?.as_str());
            names.contains(&label).then_some((label, id))
        })
        .collect();

    index_labels(pairs, "brand")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionEntry {
    label: String,
    #[serde(default)]
    int_value: Option<i64>,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    value: Option<Value>,
}

impl OptionEntry {
    fn id(&self) -> Option<i64> {
        self.int_value
            .or(self.id)
            .or_else(|| self.value.as_ref().and_then(Value::as_i64))
    }
}

/// Body type vocabulary: every `"options":[...]` list that directly follows a
/// `"name":"body_type"` marker on the landing page.
pub fn scrape_body_type_ids(html: &str) -> Vocabulary {
    let mut pairs = Vec::new();

    for (marker_start, _) in html.match_indices(BODY_TYPE_MARKER) {
        let rest = &html[marker_start + BODY_TYPE_MARKER.len()..];
        let Some(options_at) = rest.find(r#""options":"#) else {
            continue;
        };
        // The options belong to another property if a new name shows up first.
        if rest[..options_at].contains(r#""name":"#) {
            continue;
        }

        let list = rest[options_at + r#""options":"#.len()..].trim_start();
        let mut stream = serde_json::Deserializer::from_str(list).into_iter::<Vec<OptionEntry>>();
        match stream.next() {
            Some(Ok(options)) => {
                pairs.extend(
                    options
                        .into_iter()
                        .filter_map(|option| option.id().map(|id| (option.label, id))),
                );
            }
            Some(Err(e)) => debug_eprintln!("Skipping unparsable body type options: {}", e),
            None => {}
        }
    }

    index_labels(pairs, "body type")
}

#[derive(Debug, Default)]
struct LandingVocabulary {
    vendors: Vocabulary,
    body_types: Vocabulary,
}

fn known(vocabulary: &Vocabulary) -> Vec<String> {
    vocabulary.keys().cloned().collect()
}

/// Per-run name resolution state. Every cache lives as long as the resolver.
pub struct MetadataResolver<'a, T: Transport + ?Sized> {
    transport: &'a T,
    api: &'a ApiConfig,
    landing: Option<LandingVocabulary>,
    models: HashMap<i64, Vocabulary>,
    generations: HashMap<(i64, i64), Vocabulary>,
}

impl<'a, T: Transport + ?Sized> MetadataResolver<'a, T> {
    pub fn new(transport: &'a T, api: &'a ApiConfig) -> Self {
        Self {
            transport,
            api,
            landing: None,
            models: HashMap::new(),
            generations: HashMap::new(),
        }
    }

    fn landing(&mut self) -> Result<&LandingVocabulary> {
        if self.landing.is_none() {
            let reply = self.transport.get(&self.api.landing_url)?;
            if !reply.is_success() {
                return Err(CarsError::BackendUnavailable {
                    status: reply.status,
                    reason: reply.reason,
                });
            }
            let vocabulary = LandingVocabulary {
                vendors: scrape_vendor_ids(&reply.body),
                body_types: scrape_body_type_ids(&reply.body),
            };
            debug_eprintln!(
                "Landing page: {} brands, {} body types",
                vocabulary.vendors.len(),
                vocabulary.body_types.len()
            );
            self.landing = Some(vocabulary);
        }
        Ok(self.landing.get_or_insert_with(LandingVocabulary::default))
    }

    fn request_children(&self, payload: &Value, child: &str) -> Result<Vocabulary> {
        let reply = self.transport.post_json(&self.api.models_url(), payload)?;
        if !reply.is_success() {
            return Err(CarsError::BackendUnavailable {
                status: reply.status,
                reason: reply.reason,
            });
        }
        let response: Value = serde_json::from_str(&reply.body)?;
        Ok(index_labels(child_options(&response, child)?, child))
    }

    pub fn vendors(&mut self) -> Result<&Vocabulary> {
        Ok(&self.landing()?.vendors)
    }

    pub fn body_types(&mut self) -> Result<&Vocabulary> {
        Ok(&self.landing()?.body_types)
    }

    pub fn models(&mut self, vendor_id: i64) -> Result<&Vocabulary> {
        if !self.models.contains_key(&vendor_id) {
            debug_eprintln!("Requesting models of brand {}", vendor_id);
            let models = self.request_children(&models_payload(vendor_id), "model")?;
            self.models.insert(vendor_id, models);
        }
        Ok(&self.models[&vendor_id])
    }

    pub fn generations(&mut self, vendor_id: i64, model_id: i64) -> Result<&Vocabulary> {
        let key = (vendor_id, model_id);
        if !self.generations.contains_key(&key) {
            debug_eprintln!("Requesting generations of brand {} model {}", vendor_id, model_id);
            let generations =
                self.request_children(&generations_payload(vendor_id, model_id), "generation")?;
            self.generations.insert(key, generations);
        }
        Ok(&self.generations[&key])
    }

    pub fn resolve_vendor(&mut self, name: &str) -> Result<i64> {
        let vendors = self.vendors()?;
        vendors.get(name).copied().ok_or_else(|| CarsError::UnknownVendor {
            name: name.to_string(),
            known: known(vendors),
        })
    }

    pub fn resolve_model(&mut self, vendor_id: i64, name: &str) -> Result<i64> {
        let models = self.models(vendor_id)?;
        models.get(name).copied().ok_or_else(|| CarsError::UnknownModel {
            name: name.to_string(),
            known: known(models),
        })
    }

    pub fn resolve_generation(&mut self, vendor_id: i64, model_id: i64, name: &str) -> Result<i64> {
        let generations = self.generations(vendor_id, model_id)?;
        generations.get(name).copied().ok_or_else(|| CarsError::UnknownGeneration {
            name: name.to_string(),
            known: known(generations),
        })
    }

    pub fn resolve_body_type(&mut self, name: &str) -> Result<i64> {
        let body_types = self.body_types()?;
        body_types.get(name).copied().ok_or_else(|| CarsError::UnknownBodyType {
            name: name.to_string(),
            known: known(body_types),
        })
    }

    pub fn resolve(&mut self, query: &VehicleQuery) -> Result<ResolvedIdentifiers> {
        let vendor_id = self.resolve_vendor(&query.brand)?;
        let model_id = self.resolve_model(vendor_id, &query.model)?;
        let generation_id = match query.generation() {
            Some(generation) => Some(self.resolve_generation(vendor_id, model_id, generation)?),
            None => None,
        };
        let body_type_ids = query
            .body_types
            .iter()
            .map(|body_type| self.resolve_body_type(body_type))
            .collect::<Result<BTreeSet<i64>>>()?;

        Ok(ResolvedIdentifiers {
            vendor_id,
            model_id,
            generation_id,
            body_type_ids,
        })
    }
}
