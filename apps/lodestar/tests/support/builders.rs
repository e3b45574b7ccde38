use lodestar::db::Document;
use lodestar::models::Engagement;
use serde_json::{json, Value};

/// Builder for engagement documents
pub struct EngagementBuilder {
    fields: Document,
}

impl EngagementBuilder {
    pub fn new(uuid: impl Into<String>) -> Self {
        let mut fields = Document::new();
        fields.insert("uuid".to_string(), Value::String(uuid.into()));
        Self { fields }
    }

    fn set(mut self, field: &str, value: Value) -> Self {
        self.fields.insert(field.to_string(), value);
        self
    }

    fn push(mut self, field: &str, item: Value) -> Self {
        let entry = self
            .fields
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = entry {
            items.push(item);
        }
        self
    }

    pub fn customer(self, name: &str) -> Self {
        self.set("customerName", json!(name))
    }

    pub fn project(self, name: &str) -> Self {
        self.set("projectName", json!(name))
    }

    pub fn project_id(self, id: i64) -> Self {
        self.set("projectId", json!(id))
    }

    pub fn description(self, text: &str) -> Self {
        self.set("description", json!(text))
    }

    pub fn end_date(self, date: &str) -> Self {
        self.set("endDate", json!(date))
    }

    pub fn archive_date(self, date: &str) -> Self {
        self.set("archiveDate", json!(date))
    }

    pub fn version(self, token: &str) -> Self {
        self.set("lastUpdate", json!(token))
    }

    pub fn launched_by(self, who: &str) -> Self {
        self.set(
            "launch",
            json!({"launchedBy": who, "launchedDateTime": "2020-01-01T00:00:00Z"}),
        )
    }

    pub fn created_by(self, who: &str) -> Self {
        self.set("creationDetails", json!({"createdByUser": who}))
    }

    pub fn status(self, overall: &str) -> Self {
        self.set("status", json!({"overallStatus": overall}))
    }

    pub fn category(self, name: &str) -> Self {
        self.push("categories", json!({"name": name, "count": 1}))
    }

    pub fn subdomain(self, subdomain: &str) -> Self {
        self.push(
            "hostingEnvironments",
            json!({"environmentName": format!("{}-env", subdomain), "ocpSubDomain": subdomain}),
        )
    }

    pub fn user(self, email: &str, role: &str) -> Self {
        self.push("engagementUsers", json!({"email": email, "role": role}))
    }

    pub fn build(self) -> Document {
        self.fields
    }

    pub fn build_engagement(self) -> Engagement {
        Engagement::from_document(self.fields).expect("builder produces a valid engagement")
    }
}
