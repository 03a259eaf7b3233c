// Hyperlink discovery
//
// PI Web API resources advertise related endpoints through a `Links`
// mapping (`{"Links": {"Self": "...", "Value": "..."}}`). Links may appear
// at any depth, e.g. inside every element of an `Items` array, so discovery
// walks the whole payload.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;
use url::Url;

/// Name of the sub-mapping that carries hyperlinks.
pub const LINKS_KEY: &str = "Links";

/// Name of the self-referencing hyperlink.
pub const SELF_LINK: &str = "Self";

/// Ordered mapping of link name to absolute URL.
///
/// Insertion order follows discovery order, so an object's own links come
/// before any link found in a nested child.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(IndexMap<String, Url>);

impl Links {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover every hyperlink anywhere in `json`.
    pub fn extract(json: &Value) -> Self {
        Self::extract_excluding(json, &[])
    }

    /// Discover hyperlinks, skipping names that collide with `declared`
    /// attribute names. The first occurrence of a name wins.
    pub fn extract_excluding(json: &Value, declared: &[&str]) -> Self {
        let mut links = Self::new();
        collect(json, declared, &mut links);
        links
    }

    /// Look up a link by name. Exact matches win over case-insensitive ones.
    pub fn get(&self, name: &str) -> Option<&Url> {
        self.0.get(name).or_else(|| {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert a link unless one with the same name already exists.
    /// Returns `true` if the link was added.
    pub fn insert(&mut self, name: impl Into<String>, url: Url) -> bool {
        let name = name.into();
        if self.0.contains_key(&name) {
            return false;
        }
        self.0.insert(name, url);
        true
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Url)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn collect(value: &Value, declared: &[&str], links: &mut Links) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(own)) = map.get(LINKS_KEY) {
                for (name, href) in own {
                    add(name, href, declared, links);
                }
            }
            if let Some(href) = map.get(SELF_LINK) {
                add(SELF_LINK, href, declared, links);
            }
            for (key, child) in map {
                if key != LINKS_KEY && (child.is_object() || child.is_array()) {
                    collect(child, declared, links);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, declared, links);
            }
        }
        _ => {}
    }
}

fn add(name: &str, href: &Value, declared: &[&str], links: &mut Links) {
    if declared.contains(&name) {
        trace!(name, "link shadowed by declared attribute");
        return;
    }
    let Some(raw) = href.as_str() else {
        return;
    };
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            links.insert(name, url);
        }
        _ => trace!(name, raw, "skipping non-URL link value"),
    }
}

/// Return the service-reported errors embedded in a response body.
///
/// `None` when the body has no `Errors` field or the list is empty.
pub fn service_errors(json: &Value) -> Option<Vec<String>> {
    let errors = json.get("Errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_top_level_links() {
        let body = json!({
            "Links": {
                "Self": "https://pi.example.com/piwebapi/",
                "Search": "https://pi.example.com/piwebapi/search"
            }
        });
        let links = Links::extract(&body);
        assert_eq!(links.len(), 2);
        assert_eq!(
            links.get("Search").unwrap().as_str(),
            "https://pi.example.com/piwebapi/search"
        );
    }

    #[test]
    fn finds_links_in_nested_arrays() {
        let body = json!({
            "Items": [
                { "Name": "a", "Links": { "Value": "https://pi/streams/a/value" } },
                { "Name": "b", "Nested": { "Links": { "EndValue": "https://pi/streams/b/end" } } }
            ]
        });
        let links = Links::extract(&body);
        assert!(links.contains("Value"));
        assert!(links.contains("EndValue"));
    }

    #[test]
    fn own_links_shadow_nested_links() {
        let body = json!({
            "Links": { "Self": "https://pi/points/outer" },
            "Child": { "Links": { "Self": "https://pi/points/inner" } }
        });
        let links = Links::extract(&body);
        assert_eq!(links.get("Self").unwrap().path(), "/points/outer");
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn declared_attributes_are_not_duplicated_as_links() {
        let body = json!({
            "Links": { "Name": "https://pi/odd", "Self": "https://pi/points/1" }
        });
        let links = Links::extract_excluding(&body, &["Name"]);
        assert!(!links.contains("Name"));
        assert!(links.contains("Self"));
    }

    #[test]
    fn self_field_outside_links_is_recognized() {
        let body = json!({ "Self": "https://pi/points/1", "Name": "sinusoid" });
        let links = Links::extract(&body);
        assert_eq!(links.names().collect::<Vec<_>>(), vec!["Self"]);
    }

    #[test]
    fn non_url_values_are_ignored() {
        let body = json!({ "Links": { "Broken": "not a url", "Count": 3 } });
        assert!(Links::extract(&body).is_empty());
    }

    #[test]
    fn lookup_falls_back_to_case_insensitive() {
        let body = json!({ "Links": { "EndValue": "https://pi/streams/x/end" } });
        let links = Links::extract(&body);
        assert!(links.get("endvalue").is_some());
    }

    #[test]
    fn service_errors_requires_non_empty_list() {
        assert!(service_errors(&json!({ "Errors": [] })).is_none());
        assert!(service_errors(&json!({ "Name": "x" })).is_none());
        let errors = service_errors(&json!({ "Errors": ["bad web id", 42] })).unwrap();
        assert_eq!(errors, vec!["bad web id".to_string(), "42".to_string()]);
    }
}
