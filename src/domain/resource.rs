use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path-like identifier the resource manager assigns to every resource,
/// e.g. `/subscriptions/<id>/resourceGroups/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn for_resource_group(subscription: &SubscriptionId, name: &str) -> Self {
        Self(format!("/subscriptions/{subscription}/resourceGroups/{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value that follows `segment` in the path, compared case-insensitively.
    pub fn segment_value(&self, segment: &str) -> Option<&str> {
        let mut parts = self.0.split('/').filter(|part| !part.is_empty());
        while let Some(part) = parts.next() {
            if part.eq_ignore_ascii_case(segment) {
                return parts.next();
            }
        }
        None
    }

    pub fn resource_group_name(&self) -> Option<&str> {
        self.segment_value("resourceGroups")
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Azure region name in its canonical lowercase form (`westus`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub fn new(value: impl AsRef<str>) -> Self {
        let canonical = value
            .as_ref()
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        Self(canonical)
    }

    pub fn west_us() -> Self {
        Self::new("westus")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::west_us()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroup {
    pub id: ResourceId,
    pub name: String,
    pub location: Location,
    pub provisioning_state: Option<String>,
}

/// Final state of a completed template deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRecord {
    pub id: ResourceId,
    pub name: String,
    pub provisioning_state: Option<String>,
    pub outputs: Option<serde_json::Value>,
}
