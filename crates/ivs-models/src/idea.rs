use serde::{Deserialize, Serialize};

/// The structured business-idea form captured at intake.
///
/// Every field defaults when absent. Intake validates the form before a
/// submission is created; downstream code only forwards it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct IdeaPayload {
    pub title: String,
    pub description: String,
    /// e.g. "Fintech", "Agritech", "Healthtech".
    pub category: String,
    pub problem_statement: String,
    pub proposed_solution: String,
    pub target_customers: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_channels: Option<String>,
    pub target_countries: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_city: Option<String>,
    /// "Idea only", "Prototype/MVP" or "Live/revenue".
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub competitors: Option<String>,
    pub budget: String,
    /// "Solo", "2-3", "4-5" or "6+".
    pub team_size: String,
    /// "<3 months", "3-6 months", "6-12 months" or "12+ months".
    pub timeline: String,
}

impl IdeaPayload {
    /// Comma-joined target countries, as rendered into analyst prompts.
    pub fn countries(&self) -> String {
        self.target_countries.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_payload_deserializes() {
        let json = r#"{"title": "AgriFlow", "category": "Agritech", "targetCountries": ["Kenya"]}"#;
        let payload: IdeaPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.title, "AgriFlow");
        assert_eq!(payload.category, "Agritech");
        assert_eq!(payload.target_countries, vec!["Kenya".to_string()]);
        assert!(payload.description.is_empty());
        assert!(payload.competitors.is_none());
    }

    #[test]
    fn serializes_camel_case() {
        let payload = IdeaPayload {
            title: "PayLink".to_string(),
            problem_statement: "Cross-border remittances are slow".to_string(),
            team_size: "2-3".to_string(),
            target_countries: vec!["Nigeria".to_string(), "Ghana".to_string()],
            ..Default::default()
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["problemStatement"], "Cross-border remittances are slow");
        assert_eq!(value["teamSize"], "2-3");
        assert!(value.get("targetCity").is_none());
        assert_eq!(payload.countries(), "Nigeria, Ghana");
    }
}
