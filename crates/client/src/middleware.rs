use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Result,
    request::{ApiRequest, ApiResponse},
    transport::Transport,
};

/// One stage of the request pipeline.
///
/// A stage may rewrite the request before handing it on, inspect the response
/// on the way back, or call `next` more than once (the refresh-retry stage
/// does, at most twice).
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse>;
}

/// The rest of the pipeline after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    transport: &'a dyn Transport,
    stages: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub fn new(transport: &'a dyn Transport, stages: &'a [Arc<dyn Middleware>]) -> Self {
        Self { transport, stages }
    }

    pub async fn run(self, request: ApiRequest) -> Result<ApiResponse> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage
                    .handle(request, Next {
                        transport: self.transport,
                        stages: rest,
                    })
                    .await
            },
            None => self.transport.send(&request).await,
        }
    }
}
