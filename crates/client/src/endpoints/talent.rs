use serde_json::Value;

use crate::{ApiClient, Result};

/// Talent identification assessment (`/talent-identification`).
pub struct TalentApi<'a> {
    client: &'a ApiClient,
}

impl<'a> TalentApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn analyze(&self, assessment: &Value) -> Result<Value> {
        self.client
            .post_json("/talent-identification/analyze", assessment)
            .await
    }

    pub async fn talent_areas(&self) -> Result<Value> {
        self.client
            .get_json("/talent-identification/talent-areas")
            .await
    }

    pub async fn aptitude_questions(&self) -> Result<Value> {
        self.client
            .get_json("/talent-identification/aptitude-questions")
            .await
    }

    pub async fn intelligence_types(&self) -> Result<Value> {
        self.client
            .get_json("/talent-identification/intelligence-types")
            .await
    }
}
