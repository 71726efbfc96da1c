//! String-keyed transport properties and plugin configuration.
//!
//! Properties describe how to reach a device over one transport (an address
//! and port, an onion address). They are exchanged with contacts and stored
//! by the application, so they stay plain string maps; each plugin parses
//! and validates the keys it understands.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use thicket_core::ContactId;

/// Ordered string-keyed map used for both properties and plugin config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap(BTreeMap<String, String>);

/// How this device, or a contact, is reached over one transport.
pub type TransportProperties = PropertyMap;

/// Per-plugin settings supplied by the application.
pub type PluginConfig = PropertyMap;

/// Remote properties of every contact, keyed by contact.
pub type RemoteProperties = BTreeMap<ContactId, TransportProperties>;

/// A property or config value that did not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{key} = {value:?}: {reason}")]
pub struct InvalidValue {
    /// Offending key
    pub key: String,
    /// Raw value as supplied
    pub value: String,
    /// What was expected
    pub reason: String,
}

impl PropertyMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Parse `key` as `T`. A missing key is `Ok(None)`; a present key that
    /// fails to parse is an error naming the key.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, InvalidValue>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.parse().map(Some).map_err(|err: T::Err| InvalidValue {
            key: key.to_owned(),
            value: raw.to_owned(),
            reason: err.to_string(),
        })
    }

    /// Check `key`, if present, with `accept`.
    pub fn check(
        &self,
        key: &str,
        expected: &str,
        accept: impl FnOnce(&str) -> bool,
    ) -> Result<(), InvalidValue> {
        match self.get(key) {
            Some(raw) if !accept(raw) => Err(InvalidValue {
                key: key.to_owned(),
                value: raw.to_owned(),
                reason: format!("expected {expected}"),
            }),
            _ => Ok(()),
        }
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_missing_is_none() {
        let map = PropertyMap::new();
        assert_eq!(map.parse::<u16>("port").unwrap(), None);
    }

    #[test]
    fn parse_reports_key_and_value() {
        let map = PropertyMap::new().with("port", "http");
        let err = map.parse::<u16>("port").unwrap_err();
        assert_eq!(err.key, "port");
        assert_eq!(err.value, "http");
    }

    #[test]
    fn check_only_rejects_present_values() {
        let map = PropertyMap::new().with("onion", "UPPER");
        assert!(map.check("onion", "lowercase", |v| v == v.to_lowercase()).is_err());
        assert!(map.check("missing", "anything", |_| false).is_ok());
    }

    #[test]
    fn serializes_as_plain_object() {
        let map: PropertyMap = [("address", "10.0.0.2"), ("port", "7000")].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"address":"10.0.0.2","port":"7000"}"#);
    }
}
