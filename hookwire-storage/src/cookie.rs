//! Cookie jar storage
//!
//! Cookies hold strings. Reading parses the string back into a value with
//! [`parse_auto`], and two values are equal when their string forms are.
//! Typed reads that need a string get the raw text back when the parsed
//! value does not fit.
//! Writing `{"value": v, ...attributes}` stores `v` and keeps the remaining
//! fields as cookie attributes.

use crate::{parse_auto, Storage, StorageError};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// One stored cookie
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub value: String,
    pub attributes: Map<String, Value>,
}

impl Cookie {
    /// `Set-Cookie` style rendering, e.g. `theme=dark; Path=/; Secure`
    pub fn header(&self, name: &str) -> String {
        let mut header = format!("{}={}", name, self.value);
        for (attr, value) in &self.attributes {
            match value {
                Value::Bool(true) => header.push_str(&format!("; {}", attr)),
                Value::Bool(false) | Value::Null => {}
                other => header.push_str(&format!("; {}={}", attr, string_form(other))),
            }
        }
        header
    }
}

/// String a value is stored as
fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Split `{"value": v, ...attributes}` into `v` and its attributes
fn split(value: &Value) -> (&Value, Map<String, Value>) {
    if let Value::Object(fields) = value {
        if let Some(inner) = fields.get("value").filter(|inner| !inner.is_null()) {
            let attributes = fields
                .iter()
                .filter(|(name, _)| name.as_str() != "value")
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            return (inner, attributes);
        }
    }
    (value, Map::new())
}

/// In-memory cookie jar
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RefCell<BTreeMap<String, Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw string stored under `name`
    pub fn raw(&self, name: &str) -> Option<String> {
        self.cookies.borrow().get(name).map(|cookie| cookie.value.clone())
    }

    pub fn cookie(&self, name: &str) -> Result<Cookie, StorageError> {
        self.cookies
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownCookie(name.to_string()))
    }

    pub fn header(&self, name: &str) -> Result<String, StorageError> {
        Ok(self.cookie(name)?.header(name))
    }

    pub fn remove(&self, name: &str) -> Result<Cookie, StorageError> {
        self.cookies
            .borrow_mut()
            .remove(name)
            .ok_or_else(|| StorageError::UnknownCookie(name.to_string()))
    }

    /// Cookie names, sorted
    pub fn names(&self) -> Vec<String> {
        self.cookies.borrow().keys().cloned().collect()
    }
}

impl Storage for CookieJar {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.raw(key).map(|raw| parse_auto(&raw)))
    }

    fn text(&self, key: &str) -> Option<String> {
        self.raw(key)
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let (inner, attributes) = split(value);
        let cookie = Cookie {
            value: string_form(inner),
            attributes,
        };
        tracing::debug!(key, value = %cookie.value, "cookie set");
        self.cookies.borrow_mut().insert(key.to_string(), cookie);
        Ok(())
    }

    fn is(&self, a: &Value, b: &Value) -> bool {
        string_form(split(a).0) == string_form(split(b).0)
    }
}
