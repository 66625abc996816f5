//! URL query state codec
//!
//! Filter, sort and tab state lives in the page URL. [`RouteQuery`] is the
//! decoded query mapping; every mutation returns a [`RouteUpdate`] carrying the
//! complete new query together with shallow-routing flags, never a partial patch.
//!
//! Attribute selections are stored under `attributes[<key>]`. A single value is
//! written as a scalar and several values as a repeated key. Internally values
//! are always handled as lists; an empty list and an absent key are the same.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix of attribute selection keys
pub const ATTRIBUTE_PREFIX: &str = "attributes[";
/// Lower price bound key
pub const MIN_PRICE_KEY: &str = "price[gte]";
/// Upper price bound key
pub const MAX_PRICE_KEY: &str = "price[lte]";
/// Buy-now toggle key
pub const BUY_NOW_KEY: &str = "buyNow";
/// Sort key
pub const SORT_KEY: &str = "sort";
/// Active tab key
pub const TAB_KEY: &str = "tab";
/// Key of the single open attribute picker
pub const ATTRIBUTE_PICKER_KEY: &str = "attribute_key";
/// Tab shown when none is selected
pub const DEFAULT_TAB: &str = "items";

/// Query key for an attribute's selections
#[must_use]
pub fn attribute_key(attribute: &str) -> String {
    format!("{ATTRIBUTE_PREFIX}{attribute}]")
}

/// Attribute name from a namespaced query key
#[must_use]
pub fn attribute_name(key: &str) -> Option<&str> {
    key.strip_prefix(ATTRIBUTE_PREFIX)?.strip_suffix(']')
}

/// Scalar or repeated query value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
}

impl QueryValue {
    /// Build from a list: empty yields nothing, a singleton becomes a scalar
    #[must_use]
    pub fn from_values(mut values: Vec<String>) -> Option<Self> {
        match values.len() {
            0 => None,
            1 => values.pop().map(Self::Single),
            _ => Some(Self::Multi(values)),
        }
    }

    /// All values as a list
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// First value, for keys expected to be scalar
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Multi(values) => values.first().map(String::as_str),
        }
    }

    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.values().contains(&value)
    }
}

/// A requested route change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteUpdate {
    /// Complete query after the change
    pub query: RouteQuery,
    /// Update the URL without a navigation
    pub shallow: bool,
    /// Whether to reset scroll position
    pub scroll: bool,
}

impl RouteUpdate {
    fn shallow(query: RouteQuery) -> Self {
        Self {
            query,
            shallow: true,
            scroll: false,
        }
    }
}

/// Decoded URL query mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteQuery(BTreeMap<String, QueryValue>);

impl RouteQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw query string (without the leading `?`)
    #[must_use]
    pub fn parse(query: &str) -> Self {
        Self::from_pairs(
            url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()).into_owned(),
        )
    }

    /// Build from key/value pairs; repeated keys collect into a list
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in pairs {
            grouped.entry(key.into()).or_default().push(value.into());
        }
        Self(
            grouped
                .into_iter()
                .filter_map(|(key, values)| QueryValue::from_values(values).map(|v| (key, v)))
                .collect(),
        )
    }

    /// Encode back into a query string, repeating keys for list values
    #[must_use]
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.0 {
            for item in value.values() {
                serializer.append_pair(key, item);
            }
        }
        serializer.finish()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    /// First value of a scalar key, ignoring empty strings
    #[must_use]
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(QueryValue::first)
            .filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.0.iter()
    }

    /// Selected values of one attribute
    #[must_use]
    pub fn attribute_values(&self, attribute: &str) -> Vec<&str> {
        self.get(&attribute_key(attribute))
            .map(QueryValue::values)
            .unwrap_or_default()
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Namespaced attribute keys with at least one non-empty value
    pub fn attribute_keys(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(key, value)| {
                attribute_name(key).is_some() && value.values().iter().any(|v| !v.is_empty())
            })
            .map(|(key, _)| key.as_str())
    }

    /// Whether any attribute filter is active
    #[must_use]
    pub fn has_attribute_filters(&self) -> bool {
        self.attribute_keys().next().is_some()
    }

    fn with(&self, key: String, value: Option<QueryValue>) -> Self {
        let mut next = self.0.clone();
        match value {
            Some(value) => {
                next.insert(key, value);
            }
            None => {
                next.remove(&key);
            }
        }
        Self(next)
    }

    /// Select a value, placing it in front of existing selections
    #[must_use]
    pub fn toggle_on_attribute(&self, attribute: &str, value: &str) -> RouteUpdate {
        let mut values = vec![value.to_string()];
        values.extend(
            self.attribute_values(attribute)
                .into_iter()
                .map(str::to_string),
        );
        let key = attribute_key(attribute);
        RouteUpdate::shallow(self.with(key, QueryValue::from_values(values)))
    }

    /// Append a value after existing selections
    #[must_use]
    pub fn update_attribute(&self, attribute: &str, value: &str) -> RouteUpdate {
        let mut values: Vec<String> = self
            .attribute_values(attribute)
            .into_iter()
            .map(str::to_string)
            .collect();
        values.push(value.to_string());
        let key = attribute_key(attribute);
        RouteUpdate::shallow(self.with(key, QueryValue::from_values(values)))
    }

    /// Drop every selection of an attribute
    #[must_use]
    pub fn toggle_off_attribute(&self, attribute: &str) -> RouteUpdate {
        RouteUpdate::shallow(self.with(attribute_key(attribute), None))
    }

    /// Deselect one value; removing the last value removes the key
    #[must_use]
    pub fn toggle_off_attribute_value(&self, attribute: &str, value: &str) -> RouteUpdate {
        let remaining: Vec<String> = self
            .attribute_values(attribute)
            .into_iter()
            .filter(|selected| *selected != value)
            .map(str::to_string)
            .collect();
        let key = attribute_key(attribute);
        RouteUpdate::shallow(self.with(key, QueryValue::from_values(remaining)))
    }

    /// Attribute picker click: closes the open picker and flips the value
    #[must_use]
    pub fn select_attribute_value(&self, attribute: &str, value: &str) -> RouteUpdate {
        let closed = self.with(ATTRIBUTE_PICKER_KEY.to_string(), None);
        if closed.attribute_values(attribute).contains(&value) {
            closed.toggle_off_attribute_value(attribute, value)
        } else {
            closed.toggle_on_attribute(attribute, value)
        }
    }

    /// Open a single attribute picker, replacing any other open one
    #[must_use]
    pub fn open_attribute_picker(&self, attribute: &str) -> RouteUpdate {
        let closed = self.with(ATTRIBUTE_PICKER_KEY.to_string(), None);
        closed.set_param(ATTRIBUTE_PICKER_KEY, attribute)
    }

    /// Remove every attribute selection, leaving other keys untouched
    #[must_use]
    pub fn clear_all_attributes(&self) -> RouteUpdate {
        RouteUpdate::shallow(Self(
            self.0
                .iter()
                .filter(|(key, _)| attribute_name(key).is_none())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ))
    }

    /// Set a plain scalar parameter
    #[must_use]
    pub fn set_param(&self, key: &str, value: &str) -> RouteUpdate {
        RouteUpdate::shallow(self.with(key.to_string(), Some(QueryValue::Single(value.to_string()))))
    }

    /// Remove a plain parameter
    #[must_use]
    pub fn remove_param(&self, key: &str) -> RouteUpdate {
        RouteUpdate::shallow(self.with(key.to_string(), None))
    }
}

/// Typed view of the browsing state encoded in the URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    /// Attribute name to selected values, never empty lists
    pub attribute_selections: BTreeMap<String, Vec<String>>,
    /// Raw lower price bound; parsed by the filter engine
    pub min_price: Option<String>,
    /// Raw upper price bound; parsed by the filter engine
    pub max_price: Option<String>,
    pub buy_now_only: bool,
    pub sort: Option<String>,
    pub tab: String,
}

impl FilterState {
    /// Decode from the route query
    ///
    /// When the tenant disables aggregation buy-now defaults to on and only an
    /// explicit `buyNow=false` turns it off; otherwise only `buyNow=true` turns
    /// it on.
    #[must_use]
    pub fn decode(query: &RouteQuery, disable_aggregation: bool) -> Self {
        let attribute_selections = query
            .attribute_keys()
            .filter_map(|key| {
                let name = attribute_name(key)?;
                let values: Vec<String> = query
                    .attribute_values(name)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                (!values.is_empty()).then(|| (name.to_string(), values))
            })
            .collect();

        let buy_now = query.scalar(BUY_NOW_KEY).map(str::to_ascii_lowercase);
        let buy_now_only = if disable_aggregation {
            buy_now.as_deref() != Some("false")
        } else {
            buy_now.as_deref() == Some("true")
        };

        Self {
            attribute_selections,
            min_price: query.scalar(MIN_PRICE_KEY).map(str::to_string),
            max_price: query.scalar(MAX_PRICE_KEY).map(str::to_string),
            buy_now_only,
            sort: query.scalar(SORT_KEY).map(str::to_string),
            tab: query.scalar(TAB_KEY).unwrap_or(DEFAULT_TAB).to_string(),
        }
    }

    /// Whether any attribute is selected
    #[must_use]
    pub fn has_attribute_filters(&self) -> bool {
        !self.attribute_selections.is_empty()
    }
}
