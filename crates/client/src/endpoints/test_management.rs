use serde_json::Value;

use crate::{ApiClient, Result, request::ApiRequest};

/// Adaptive test bank (`/test-management`). Test ids are strings here.
pub struct TestManagementApi<'a> {
    client: &'a ApiClient,
}

impl<'a> TestManagementApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn tests(&self) -> Result<Value> {
        self.client.get_json("/test-management/tests").await
    }

    pub async fn create_test(&self, test: &Value) -> Result<Value> {
        self.client.post_json("/test-management/tests", test).await
    }

    pub async fn questions(&self) -> Result<Value> {
        self.client.get_json("/test-management/questions").await
    }

    pub async fn create_question(&self, question: &Value) -> Result<Value> {
        self.client
            .post_json("/test-management/questions", question)
            .await
    }

    /// Questions for one test, adapted to the student's earlier results when
    /// `performance_history` is given.
    pub async fn test_questions(
        &self,
        test_id: &str,
        performance_history: Option<&Value>,
    ) -> Result<Value> {
        let mut request = ApiRequest::get(format!("/test-management/test/{test_id}/questions"));
        if let Some(history) = performance_history {
            request = request.query("performance_history", history);
        }
        self.client.request_json(request).await
    }

    pub async fn submit(&self, submission: &Value) -> Result<Value> {
        self.client
            .post_json("/test-management/submit", submission)
            .await
    }

    pub async fn results(&self) -> Result<Value> {
        self.client.get_json("/test-management/results").await
    }

    /// Results for one test plus per-test analytics.
    pub async fn result(&self, test_id: &str) -> Result<Value> {
        self.client
            .get_json(&format!("/test-management/results/{test_id}"))
            .await
    }

    pub async fn analytics(&self) -> Result<Value> {
        self.client.get_json("/test-management/analytics").await
    }
}
