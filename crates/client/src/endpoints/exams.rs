use serde_json::Value;

use crate::{ApiClient, Result, endpoints::ListFilter, request::ApiRequest};

/// Routes under `/exams`.
pub struct ExamsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ExamsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, filter: &ListFilter) -> Result<Value> {
        self.client
            .request_json(filter.apply(ApiRequest::get("/exams")))
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Value> {
        self.client.get_json(&format!("/exams/{id}")).await
    }

    pub async fn create(&self, exam: &Value) -> Result<Value> {
        self.client.post_json("/exams", exam).await
    }

    pub async fn update(&self, id: i64, exam: &Value) -> Result<Value> {
        self.client.put_json(&format!("/exams/{id}"), exam).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.client.delete(&format!("/exams/{id}")).await.map(|_| ())
    }

    pub async fn student_exams(&self) -> Result<Value> {
        self.client.get_json("/exams/student").await
    }

    pub async fn submit_answers(&self, id: i64, answers: &Value) -> Result<Value> {
        self.client
            .post_json(
                &format!("/exams/{id}/submit"),
                &serde_json::json!({ "answers": answers }),
            )
            .await
    }

    /// Grade one student's submission. Assistants and supersubs only.
    pub async fn evaluate(&self, exam_id: i64, student_id: i64, evaluation: &Value) -> Result<Value> {
        self.client
            .post_json(&format!("/exams/{exam_id}/evaluate/{student_id}"), evaluation)
            .await
    }
}
