use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_route53::Client as Route53Client;

use super::traits::{ChangeSummary, Route53Operations};
use crate::modules::aws::error::ApiError;

pub struct Route53Module {
    client: Route53Client,
}

impl Route53Module {
    pub fn new(client: Route53Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Route53Operations for Route53Module {
    async fn get_change(&self, id: &str) -> Result<Option<ChangeSummary>> {
        let result = match self.client.get_change().id(id).send().await {
            Ok(result) => result,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_change()) => {
                return Ok(None)
            }
            Err(e) => {
                return Err(ApiError::from_sdk("GetChange", &e))
                    .with_context(|| format!("Failed to get change: {}", id))
            }
        };

        let info = result.change_info().context("No change info in response")?;

        Ok(Some(ChangeSummary {
            id: info.id().to_string(),
            status: info.status().as_str().to_string(),
            submitted_at: info.submitted_at().secs(),
        }))
    }
}
