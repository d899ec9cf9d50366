//! Typed wrappers over the backend's resource routes.
//!
//! All of them go through [`ApiClient`](crate::ApiClient), so they carry the
//! bearer and refresh behaviour of every other call. Payloads the backend
//! shapes freely are passed as [`serde_json::Value`].

pub mod exams;
pub mod guidance;
pub mod talent;
pub mod test_management;
pub mod tests;
pub mod users;

/// Filters shared by the test and exam listings.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub subject: Option<String>,
    pub concept: Option<String>,
    pub is_active: Option<bool>,
}

impl ListFilter {
    pub(crate) fn apply(&self, mut request: crate::ApiRequest) -> crate::ApiRequest {
        if let Some(subject) = &self.subject {
            request = request.query("subject", subject);
        }
        if let Some(concept) = &self.concept {
            request = request.query("concept", concept);
        }
        if let Some(active) = self.is_active {
            request = request.query("is_active", active);
        }
        request
    }
}
