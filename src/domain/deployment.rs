//! Template deployment request as submitted to the resource manager.

use serde::Serialize;
use serde::de::IgnoredAny;
use serde_json::{json, Value};
use thiserror::Error;

/// Deployment mode. Resources already in the group that the template does
/// not mention are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeploymentMode {
    Incremental,
}

#[derive(Debug, Error)]
#[error("template is not a valid JSON document: {0}")]
pub struct InvalidTemplate(#[source] pub serde_json::Error);

/// Values bound to the App Service template parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleParameters {
    pub hosting_plan_name: String,
    pub web_site_name: String,
    pub sku_name: String,
    pub sku_capacity: u32,
}

impl Default for SampleParameters {
    fn default() -> Self {
        Self {
            hosting_plan_name: "hpRSAT".to_owned(),
            web_site_name: "wnRSAT".to_owned(),
            sku_name: "B1".to_owned(),
            sku_capacity: 1,
        }
    }
}

impl SampleParameters {
    /// Parameters document with every binding wrapped as `{ "value": ... }`.
    pub fn to_document(&self) -> Value {
        json!({
            "hostingPlanName": { "value": self.hosting_plan_name },
            "webSiteName": { "value": self.web_site_name },
            "skuName": { "value": self.sku_name },
            "skuCapacity": { "value": self.sku_capacity },
        })
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    name: String,
    mode: DeploymentMode,
    template: String,
    parameters: Value,
}

impl DeploymentRequest {
    /// Builds an incremental deployment. The template text is kept as-is;
    /// it is only checked to be a single well-formed JSON document.
    pub fn incremental(
        name: impl Into<String>,
        template_text: String,
        parameters: &SampleParameters,
    ) -> Result<Self, InvalidTemplate> {
        serde_json::from_str::<IgnoredAny>(&template_text).map_err(InvalidTemplate)?;

        Ok(Self {
            name: name.into(),
            mode: DeploymentMode::Incremental,
            template: template_text,
            parameters: parameters.to_document(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_document_has_exactly_four_wrapped_keys() {
        let custom = SampleParameters {
            hosting_plan_name: "plan".to_owned(),
            web_site_name: "site".to_owned(),
            sku_name: "S1".to_owned(),
            sku_capacity: 3,
        };

        for parameters in [SampleParameters::default(), custom] {
            let document = parameters.to_document();
            let object = document.as_object().expect("parameters must be an object");

            let mut keys = object.keys().map(String::as_str).collect::<Vec<_>>();
            keys.sort_unstable();
            assert_eq!(
                keys,
                ["hostingPlanName", "skuCapacity", "skuName", "webSiteName"]
            );

            for wrapper in object.values() {
                let wrapper = wrapper.as_object().expect("binding must be an object");
                assert_eq!(wrapper.len(), 1);
                assert!(wrapper.contains_key("value"));
            }
        }
    }

    #[test]
    fn parameters_document_carries_literal_values() {
        let document = SampleParameters::default().to_document();

        assert_eq!(document["hostingPlanName"]["value"], "hpRSAT");
        assert_eq!(document["webSiteName"]["value"], "wnRSAT");
        assert_eq!(document["skuName"]["value"], "B1");
        assert_eq!(document["skuCapacity"]["value"], 1);
    }

    #[test]
    fn template_text_is_embedded_verbatim() {
        let text = "{\n  \"resources\" : [ ],\n  \"$schema\": \"x\"\n}".to_owned();

        let request =
            DeploymentRequest::incremental("dp", text.clone(), &SampleParameters::default())
                .expect("template is valid JSON");

        assert_eq!(request.template(), text);
        assert_eq!(request.mode(), DeploymentMode::Incremental);
        assert_eq!(request.name(), "dp");
    }

    #[test]
    fn leading_whitespace_survives_validation() {
        let text = "\n  {\"resources\": []}".to_owned();

        let request =
            DeploymentRequest::incremental("dp", text.clone(), &SampleParameters::default())
                .expect("template is valid JSON");

        assert_eq!(request.template(), text);
    }

    #[test]
    fn rejects_malformed_template() {
        let error = DeploymentRequest::incremental(
            "dp",
            "{ not json".to_owned(),
            &SampleParameters::default(),
        )
        .expect_err("malformed template must be rejected");

        assert!(error.to_string().contains("valid JSON"));
    }
}
