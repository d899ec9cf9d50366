use serde_json::Value;

use crate::{ApiClient, Result, endpoints::ListFilter, request::ApiRequest};

/// Routes under `/tests`.
pub struct TestsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> TestsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, filter: &ListFilter) -> Result<Value> {
        self.client
            .request_json(filter.apply(ApiRequest::get("/tests")))
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Value> {
        self.client.get_json(&format!("/tests/{id}")).await
    }

    pub async fn create(&self, test: &Value) -> Result<Value> {
        self.client.post_json("/tests", test).await
    }

    pub async fn update(&self, id: i64, test: &Value) -> Result<Value> {
        self.client.put_json(&format!("/tests/{id}"), test).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.client.delete(&format!("/tests/{id}")).await.map(|_| ())
    }

    /// Tests assigned to the logged-in student.
    pub async fn student_tests(&self) -> Result<Value> {
        self.client.get_json("/tests/student").await
    }

    pub async fn submit_answers(&self, id: i64, answers: &Value) -> Result<Value> {
        self.client
            .post_json(
                &format!("/tests/{id}/submit"),
                &serde_json::json!({ "answers": answers }),
            )
            .await
    }
}
