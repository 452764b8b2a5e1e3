use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{
    new_snapshot_id, AppliedPolicy, ApplyPolicyRequest, ApplyPolicyResponse,
    GeneratePolicyRequest, GeneratePolicyResponse, GraphContext,
};
use super::{PolicyApplier, PolicyGenerator};
use crate::config::{PolicyServiceConfig, RequestConfig};
use crate::engine::Policy;
use crate::error::{PolicyServiceError, PolicyServiceResult};
use crate::graph::CausalGraph;

const GENERATE_PATH: &str = "/api/generate-policy";
const APPLY_PATH: &str = "/api/apply-policy";
/// Upper bound on a single backoff sleep.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Client for the external policy generation / application service
#[derive(Clone)]
pub struct PolicyServiceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    request_config: RequestConfig,
}

impl PolicyServiceClient {
    /// Create a new policy service client
    pub fn new(
        config: &PolicyServiceConfig,
        request_config: RequestConfig,
    ) -> PolicyServiceResult<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| PolicyServiceError::Network {
                message: "policy service URL is not configured".to_string(),
            })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(PolicyServiceError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request a policy for a research query
    pub async fn generate_policy(
        &self,
        research_query: &str,
        context: &GraphContext,
    ) -> PolicyServiceResult<Policy> {
        let request = GeneratePolicyRequest {
            research_query,
            graph_context: context,
        };
        let response: GeneratePolicyResponse = self.post_with_retry(GENERATE_PATH, &request).await?;

        let policy = response
            .policy
            .ok_or_else(|| PolicyServiceError::MalformedResponse {
                message: "response has no policy".to_string(),
            })?;

        let issues = policy.check_against(context);
        if !issues.is_empty() {
            warn!(
                policy = %policy.id,
                issues = ?issues,
                "Generated policy references graph elements that will not apply cleanly"
            );
        }

        info!(
            policy = %policy.id,
            name = %policy.name,
            mutations = policy.mutations.len(),
            evidence = response.research_evidence.len(),
            "Policy generated"
        );
        Ok(policy)
    }

    /// Ask the service to apply a policy and report the impact
    pub async fn apply_policy(
        &self,
        policy: &Policy,
        baseline: &CausalGraph,
    ) -> PolicyServiceResult<AppliedPolicy> {
        let context = GraphContext::from_graph(baseline);
        let request = ApplyPolicyRequest {
            policy,
            graph_context: &context,
        };
        let response: ApplyPolicyResponse = self.post_with_retry(APPLY_PATH, &request).await?;

        let snapshot = response
            .snapshot
            .ok_or_else(|| PolicyServiceError::MalformedResponse {
                message: "response has no snapshot".to_string(),
            })?;
        let impact = snapshot
            .impact
            .ok_or_else(|| PolicyServiceError::MalformedResponse {
                message: "snapshot has no impact".to_string(),
            })?;
        let post_policy_graph = snapshot
            .post_policy_graph
            .ok_or_else(|| PolicyServiceError::MalformedResponse {
                message: "snapshot has no post_policy_graph".to_string(),
            })?;

        info!(
            policy = %policy.id,
            co2_change_pct = impact.co2.change_pct,
            aqi_change_pct = impact.aqi.change_pct,
            "Remote policy application succeeded"
        );

        Ok(AppliedPolicy {
            snapshot_id: snapshot.snapshot_id.unwrap_or_else(new_snapshot_id),
            policy_id: policy.id.clone(),
            post_policy_graph: CausalGraph::from(post_policy_graph),
            impact,
        })
    }

    /// POST a JSON body, retrying network-class failures with backoff
    async fn post_with_retry<B, R>(&self, path: &str, body: &B) -> PolicyServiceResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = backoff_delay(self.request_config.retry_delay_ms, retries);
                warn!(
                    path = %path,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying policy service request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, body).await {
                Ok(response) => {
                    info!(
                        path = %path,
                        latency_ms = start.elapsed().as_millis(),
                        "Policy service call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) if !e.is_retryable() => {
                    error!(
                        path = %path,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        "Policy service call failed (not retryable)"
                    );
                    return Err(e);
                }
                Err(e) => {
                    error!(
                        path = %path,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Policy service call failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(PolicyServiceError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    /// Execute a single request (internal)
    async fn execute_request<B, R>(&self, url: &str, body: &B) -> PolicyServiceResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        debug!(url = %url, "Calling policy service");

        let mut builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                PolicyServiceError::Timeout {
                    timeout_ms: self.request_config.timeout_ms,
                }
            } else if e.is_connect() {
                PolicyServiceError::Network {
                    message: e.to_string(),
                }
            } else {
                PolicyServiceError::Http(e)
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(PolicyServiceError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PolicyServiceError::MalformedResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }
}

#[async_trait]
impl PolicyGenerator for PolicyServiceClient {
    async fn generate(
        &self,
        research_query: &str,
        context: &GraphContext,
    ) -> PolicyServiceResult<Policy> {
        self.generate_policy(research_query, context).await
    }
}

#[async_trait]
impl PolicyApplier for PolicyServiceClient {
    async fn apply(
        &self,
        policy: &Policy,
        baseline: &CausalGraph,
    ) -> PolicyServiceResult<AppliedPolicy> {
        self.apply_policy(policy, baseline).await
    }
}

/// Exponential backoff before retry number `retry` (1-based), capped at
/// [`MAX_BACKOFF_MS`].
fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    let factor = 2_u64.checked_pow(retry.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
}
