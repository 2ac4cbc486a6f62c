// src/services/markets.rs
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// A Product/Service Classification filter entry, serialized as `[type, code]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PscCode(pub String, pub String);

impl PscCode {
    pub fn product(code: &str) -> Self {
        PscCode("Product".to_string(), code.to_string())
    }

    pub fn code(&self) -> &str {
        &self.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PscEntry {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub name: String,
    pub psc_codes: Vec<PscEntry>,
}

fn psc_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{4}$").expect("static PSC pattern"))
}

pub fn is_valid_psc_code(code: &str) -> bool {
    psc_pattern().is_match(code)
}

const BUILTIN_MARKETS: [(&str, &[&str]); 5] = [
    ("Electronic Warfare", &["1040", "5840", "5865"]),
    ("Cybersecurity", &["7010", "7030", "D310"]),
    ("Artificial Intelligence", &["7030", "7035", "D302", "D307"]),
    ("Unmanned Systems", &["1000", "1550", "1710", "2355"]),
    ("Space Systems", &["1810", "5810", "5865"]),
];

const PSC_DESCRIPTIONS: [(&str, &str); 15] = [
    ("1040", "Directed Energy Weapons"),
    ("5840", "Radar Equipment"),
    ("5865", "Electronic Countermeasures"),
    ("7010", "Computer Equipment"),
    ("7030", "Software"),
    ("D310", "IT Security Services"),
    ("7035", "AI Hardware"),
    ("D302", "IT Systems Development"),
    ("D307", "IT Strategy and Architecture"),
    ("1000", "Weapons"),
    ("1550", "Unmanned Aircraft"),
    ("1710", "Aircraft Components"),
    ("2355", "Ground Vehicles"),
    ("1810", "Space Vehicles"),
    ("5810", "Communications Security Equipment"),
];

/// Named groupings of PSC codes that define a market sector.
#[derive(Debug, Clone)]
pub struct MarketRegistry {
    markets: BTreeMap<String, Vec<PscCode>>,
    descriptions: BTreeMap<String, String>,
}

impl Default for MarketRegistry {
    fn default() -> Self {
        MarketRegistry {
            markets: BUILTIN_MARKETS
                .iter()
                .map(|(name, codes)| {
                    (name.to_string(), codes.iter().map(|c| PscCode::product(c)).collect())
                })
                .collect(),
            descriptions: PSC_DESCRIPTIONS
                .iter()
                .map(|(code, desc)| (code.to_string(), desc.to_string()))
                .collect(),
        }
    }
}

impl MarketRegistry {
    pub fn psc_codes(&self, market: &str) -> Option<&[PscCode]> {
        self.markets.get(market).map(Vec::as_slice)
    }

    pub fn contains(&self, market: &str) -> bool {
        self.markets.contains_key(market)
    }

    pub fn market_names(&self) -> Vec<&str> {
        self.markets.keys().map(String::as_str).collect()
    }

    pub fn describe(&self, code: &str) -> &str {
        self.descriptions.get(code).map(String::as_str).unwrap_or("Unknown")
    }

    pub fn summaries(&self) -> Vec<MarketSummary> {
        self.markets
            .iter()
            .map(|(name, codes)| MarketSummary {
                name: name.clone(),
                psc_codes: codes
                    .iter()
                    .map(|psc| PscEntry {
                        code: psc.code().to_string(),
                        description: self.describe(psc.code()).to_string(),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Insert or replace a market. Rejects codes that are not four uppercase alphanumerics.
    pub fn add_market(&mut self, name: &str, codes: Vec<PscCode>) -> Result<(), String> {
        if let Some(bad) = codes.iter().find(|psc| !is_valid_psc_code(psc.code())) {
            return Err(format!("invalid PSC code '{}' for market {}", bad.code(), name));
        }
        self.markets.insert(name.to_string(), codes);
        Ok(())
    }

    /// Replace the codes of an existing market; unknown markets are left alone.
    pub fn update_market(&mut self, name: &str, codes: Vec<PscCode>) -> Result<bool, String> {
        if !self.contains(name) {
            return Ok(false);
        }
        self.add_market(name, codes)?;
        Ok(true)
    }

    pub fn remove_market(&mut self, name: &str) -> bool {
        self.markets.remove(name).is_some()
    }
}
