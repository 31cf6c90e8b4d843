//! Core domain model for state fuel-price queries.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "ifp-core";

pub const COUNTRY_ID: &str = "india";
pub const COUNTRY_NAME: &str = "India";
pub const RETAIL_UNIT: &str = "litre";
pub const CURRENCY: &str = "INR";
pub const PRICE_CHANGE_INTERVAL: &str = "day";

/// Display name used when a table row carries no readable city text.
pub const UNKNOWN_CITY: &str = "Unknown City";

/// Canonical state name -> source slug, as published by the upstream site.
const BUNDLED_STATES: &[(&str, &str)] = &[
    ("andaman-and-nicobar-islands", "andaman-nicobar-s1"),
    ("andhra-pradesh", "andhra-pradesh-s2"),
    ("arunachal-pradesh", "arunachal-pradesh-s3"),
    ("assam", "assam-s4"),
    ("bihar", "bihar-s5"),
    ("chandigarh", "chandigarh-s6"),
    ("chhattisgarh", "chhatisgarh-s7"),
    ("dadra-and-nagar-haveli", "dadra-nagarhaveli-s8"),
    ("daman-and-diu", "daman-diu-s9"),
    ("delhi", "delhi-s10"),
    ("goa", "goa-s11"),
    ("gujarat", "gujarat-s12"),
    ("haryana", "haryana-s13"),
    ("himachal-pradesh", "himachal-pradesh-s14"),
    ("jammu-and-kashmir", "jammu-kashmir-s15"),
    ("jharkhand", "jharkhand-s16"),
    ("karnataka", "karnataka-s17"),
    ("kerala", "kerala-s18"),
    ("madhya-pradesh", "madhya-pradesh-s19"),
    ("maharashtra", "maharashtra-s20"),
    ("manipur", "manipur-s21"),
    ("meghalaya", "meghalaya-s22"),
    ("mizoram", "mizoram-s23"),
    ("nagaland", "nagaland-s24"),
    ("odisha", "odisha-s25"),
    ("pondicherry", "pondicherry-s26"),
    ("punjab", "punjab-s27"),
    ("rajasthan", "rajasthan-s28"),
    ("sikkim", "sikkim-s29"),
    ("tamil-nadu", "tamil-nadu-s30"),
    ("telangana", "telangana-s31"),
    ("tripura", "tripura-s32"),
    ("uttar-pradesh", "uttar-pradesh-s33"),
    ("uttarakhand", "uttarakhand-s34"),
    ("west-bengal", "west-bengal-s35"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Petrol,
    Diesel,
    Cng,
}

impl FuelType {
    /// Fetch order for a state query. Later passes only overwrite their own key.
    pub const ALL: [FuelType; 3] = [FuelType::Petrol, FuelType::Diesel, FuelType::Cng];

    pub fn as_str(self) -> &'static str {
        match self {
            FuelType::Petrol => "petrol",
            FuelType::Diesel => "diesel",
            FuelType::Cng => "cng",
        }
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque upstream path segment for one state, e.g. `uttar-pradesh-s33`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSlug(String);

impl StateSlug {
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading slug segment, used as the response `stateId`.
    pub fn state_id(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }

    /// Title-cased words expected somewhere in the state's page title.
    ///
    /// The trailing sequence index (`s33`) never appears in page titles and is dropped.
    pub fn title_tokens(&self) -> Vec<String> {
        title_case(&self.0.replace('-', " "))
            .split_whitespace()
            .filter(|word| !is_sequence_index(word))
            .map(ToString::to_string)
            .collect()
    }
}

impl fmt::Display for StateSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_sequence_index(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some('s' | 'S'))
        && !chars.as_str().is_empty()
        && chars.all(|c| c.is_ascii_digit())
}

/// Immutable lookup from canonical state names to slugs.
#[derive(Debug, Clone)]
pub struct StateDirectory {
    slugs: BTreeMap<String, StateSlug>,
}

impl StateDirectory {
    pub fn bundled() -> Self {
        Self::from_entries(BUNDLED_STATES.iter().copied())
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            slugs: entries
                .into_iter()
                .map(|(name, slug)| (name.to_string(), StateSlug::new(slug)))
                .collect(),
        }
    }

    /// Lowercase with spaces turned into hyphens: `"West Bengal"` -> `"west-bengal"`.
    pub fn canonicalize(state_name: &str) -> String {
        state_name.replace(' ', "-").to_lowercase()
    }

    pub fn lookup(&self, state_name: &str) -> Option<&StateSlug> {
        self.slugs.get(&Self::canonicalize(state_name))
    }

    /// Entries ordered by canonical name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateSlug)> {
        self.slugs.iter().map(|(name, slug)| (name.as_str(), slug))
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}

impl Default for StateDirectory {
    fn default() -> Self {
        Self::bundled()
    }
}

/// Uppercase every letter that follows a non-letter, lowercase the rest.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_is_letter = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }
    out
}

/// Stable per-city key shared by every fuel type's page.
pub fn city_id(city_name: &str) -> String {
    city_name.to_lowercase().replace(' ', "-")
}

/// One table row before price normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub city_name: String,
    pub today_text: String,
    pub yesterday_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelPriceEntry {
    /// `0.0` doubles as the "no data" sentinel; upstream does not distinguish it from a real zero.
    pub retail_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retail_price_change: Option<f64>,
    pub retail_unit: String,
    pub currency: String,
    pub retail_price_change_interval: String,
}

impl FuelPriceEntry {
    pub fn new(retail_price: f64, retail_price_change: Option<f64>) -> Self {
        Self {
            retail_price,
            retail_price_change,
            retail_unit: RETAIL_UNIT.to_string(),
            currency: CURRENCY.to_string(),
            retail_price_change_interval: PRICE_CHANGE_INTERVAL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityRecord {
    pub city_id: String,
    pub city_name: String,
    pub applicable_on: NaiveDate,
    pub fuel: BTreeMap<FuelType, FuelPriceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResult {
    pub state_id: String,
    pub state_name: String,
    pub country_id: String,
    pub country_name: String,
    pub city_prices: Vec<CityRecord>,
}

impl StateResult {
    /// `state_name` is the caller's input, rendered with hyphens as spaces and title-cased.
    pub fn new(slug: &StateSlug, state_name: &str, city_prices: Vec<CityRecord>) -> Self {
        Self {
            state_id: slug.state_id().to_string(),
            state_name: title_case(&state_name.replace('-', " ")),
            country_id: COUNTRY_ID.to_string(),
            country_name: COUNTRY_NAME.to_string(),
            city_prices,
        }
    }
}

/// Non-fatal signal raised while building a state result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    TitleMismatch {
        fuel: FuelType,
        expected: Vec<String>,
        actual: String,
    },
    MissingContainer {
        fuel: FuelType,
    },
    MissingTables {
        fuel: FuelType,
    },
    FetchFailed {
        fuel: FuelType,
        url: String,
        message: String,
    },
}

impl Diagnostic {
    pub fn fuel(&self) -> FuelType {
        match self {
            Diagnostic::TitleMismatch { fuel, .. }
            | Diagnostic::MissingContainer { fuel }
            | Diagnostic::MissingTables { fuel }
            | Diagnostic::FetchFailed { fuel, .. } => *fuel,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TitleMismatch {
                fuel,
                expected,
                actual,
            } => write!(
                f,
                "{fuel}: title mismatch, expected one of {expected:?} in title, got {actual:?}"
            ),
            Diagnostic::MissingContainer { fuel } => {
                write!(f, "{fuel}: price table container not found")
            }
            Diagnostic::MissingTables { fuel } => write!(f, "{fuel}: no price tables found"),
            Diagnostic::FetchFailed { fuel, url, message } => {
                write!(f, "{fuel}: fetch of {url} failed: {message}")
            }
        }
    }
}

/// Request-local accumulator that folds per-fuel rows into one record per city.
#[derive(Debug, Clone)]
pub struct CityMerger {
    applicable_on: NaiveDate,
    records: Vec<CityRecord>,
    index: HashMap<String, usize>,
}

impl CityMerger {
    pub fn new(applicable_on: NaiveDate) -> Self {
        Self {
            applicable_on,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Upsert `fuel` on the city's record. Name and date of an existing record are kept.
    pub fn merge(&mut self, city_id: &str, city_name: &str, fuel: FuelType, entry: FuelPriceEntry) {
        match self.index.get(city_id) {
            Some(&pos) => {
                self.records[pos].fuel.insert(fuel, entry);
            }
            None => {
                self.index.insert(city_id.to_string(), self.records.len());
                self.records.push(CityRecord {
                    city_id: city_id.to_string(),
                    city_name: city_name.to_string(),
                    applicable_on: self.applicable_on,
                    fuel: BTreeMap::from([(fuel, entry)]),
                });
            }
        }
    }

    pub fn get(&self, city_id: &str) -> Option<&CityRecord> {
        self.index.get(city_id).map(|&pos| &self.records[pos])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in first-seen order.
    pub fn into_records(self) -> Vec<CityRecord> {
        self.records
    }
}
