use serde_json::Value;

use crate::{ApiClient, Result};

/// Career guidance assessment (`/career-guidance`).
pub struct CareerGuidanceApi<'a> {
    client: &'a ApiClient,
}

impl<'a> CareerGuidanceApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Submit the wizard's answers (interests, skills, personality, values)
    /// and get back ranked career recommendations.
    pub async fn analyze(&self, assessment: &Value) -> Result<Value> {
        self.client
            .post_json("/career-guidance/analyze", assessment)
            .await
    }

    pub async fn careers(&self) -> Result<Value> {
        self.client.get_json("/career-guidance/careers").await
    }

    pub async fn skills(&self) -> Result<Value> {
        self.client.get_json("/career-guidance/skills").await
    }
}
