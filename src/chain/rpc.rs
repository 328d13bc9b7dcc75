//! JSON-RPC client for a network endpoint.
//!
//! Read operations use the standard JSON-RPC methods. Write operations are
//! forwarded as `relay_*` methods to the same endpoint, which is expected to
//! be fronted by a signing relay holding the deployment authorities.

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{ChainError, DeployError, Result};

use super::traits::{ChainConnection, MetadataProgram, PoolProgram, TokenProgram};
use super::types::{
    AddLiquidityRequest, AssociatedAccountRequest, CreateMetadataRequest, CreateMintRequest,
    CreatePoolRequest, CreatedPool, LockLiquidityRequest, MintToRequest, SetAuthorityRequest,
};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// JSON-RPC client for one endpoint.
#[derive(Debug)]
pub struct RpcChain {
    /// HTTP client.
    client: Client,
    /// Endpoint URL.
    endpoint: String,
    /// Base retry delay.
    retry_delay: Duration,
    /// Request id counter.
    next_id: AtomicU64,
}

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// `{ context, value }` wrapper used by most read methods.
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

/// Signature-only relay response.
#[derive(Debug, Deserialize)]
struct SignatureResponse {
    signature: String,
}

impl RpcChain {
    /// Creates a new client for the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ChainError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            next_id: AtomicU64::new(1),
        })
    }

    /// Sets the base delay between retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Executes a read call, retrying transient failures.
    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        self.call_with_retry(method, params, DeployError::is_retryable)
            .await
    }

    /// Executes a write call.
    ///
    /// A write is only resent after a rate-limit rejection. Any other failure,
    /// a timeout included, may follow a delivered request and is returned as is.
    async fn submit<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        self.call_with_retry(method, params, |e| {
            matches!(e, DeployError::Chain(ChainError::RateLimited { .. }))
        })
        .await
    }

    /// Runs a call up to `MAX_RETRIES` times while `retryable` accepts the error.
    async fn call_with_retry<T, F>(
        &self,
        method: &str,
        params: serde_json::Value,
        retryable: F,
    ) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
        F: Fn(&DeployError) -> bool + Send + Sync,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.call_once::<T>(method, &params).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < MAX_RETRIES && retryable(&e) => {
                    let delay = self.backoff(&e, attempt);
                    debug!(
                        "Retry attempt {attempt} of {MAX_RETRIES} for {method} in {}ms: {e}",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Delay before the next attempt: linear backoff, or longer if the
    /// endpoint asked for it.
    fn backoff(&self, error: &DeployError, attempt: u32) -> Duration {
        let base = self.retry_delay * attempt;
        error
            .retry_delay_secs()
            .map_or(base, |secs| base.max(Duration::from_secs(secs)))
    }

    /// Executes a single JSON-RPC request.
    async fn call_once<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: &serde_json::Value,
    ) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params: params.clone(),
        };
        trace!("Calling {method} on {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                DeployError::Chain(ChainError::NetworkError {
                    message: format!("Request failed: {e}"),
                })
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();

            return Err(DeployError::Chain(ChainError::RateLimited {
                retry_after_secs: retry_after,
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Chain(ChainError::RequestFailed {
                status: status.as_u16(),
                message: body,
            }));
        }

        let rpc_response: RpcResponse<T> = response.json().await.map_err(|e| {
            DeployError::Chain(ChainError::InvalidResponse {
                message: format!("Failed to parse response to {method}: {e}"),
            })
        })?;

        if let Some(error) = rpc_response.error {
            return Err(DeployError::Chain(ChainError::Rpc {
                code: error.code,
                message: error.message,
            }));
        }

        rpc_response.result.ok_or_else(|| {
            DeployError::Chain(ChainError::InvalidResponse {
                message: format!("No result in response to {method}"),
            })
        })
    }

    /// Forwards a write request to the relay and returns its signature.
    async fn relay<R: Serialize + Sync>(&self, method: &str, request: &R) -> Result<String> {
        let params = serde_json::to_value(request)
            .map_err(|e| ChainError::invalid_response(format!("Failed to encode {method}: {e}")))?;
        let response: SignatureResponse = self.submit(method, serde_json::json!([params])).await?;
        Ok(response.signature)
    }
}

#[async_trait]
impl ChainConnection for RpcChain {
    async fn get_version(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct Version {
            #[serde(rename = "solana-core")]
            core: String,
        }

        let version: Version = self.call("getVersion", serde_json::json!([])).await?;
        Ok(version.core)
    }

    async fn get_slot(&self) -> Result<u64> {
        self.call("getSlot", serde_json::json!([])).await
    }

    async fn get_balance(&self, address: &str) -> Result<u64> {
        let balance: WithContext<u64> = self.call("getBalance", serde_json::json!([address])).await?;
        Ok(balance.value)
    }

    async fn get_token_account_balance(&self, account: &str) -> Result<u64> {
        #[derive(Deserialize)]
        struct TokenAmount {
            amount: String,
        }

        let balance: WithContext<TokenAmount> = self
            .call("getTokenAccountBalance", serde_json::json!([account]))
            .await?;

        balance.value.amount.parse().map_err(|e| {
            DeployError::Chain(ChainError::invalid_response(format!(
                "Token amount '{}' is not an integer: {e}",
                balance.value.amount
            )))
        })
    }

    async fn account_exists(&self, address: &str) -> Result<bool> {
        let info: WithContext<Option<serde_json::Value>> = self
            .call(
                "getAccountInfo",
                serde_json::json!([address, { "encoding": "base64" }]),
            )
            .await?;
        Ok(info.value.is_some())
    }

    async fn find_token_account(&self, owner: &str, mint: &str) -> Result<Option<String>> {
        #[derive(Deserialize)]
        struct KeyedAccount {
            pubkey: String,
        }

        let accounts: WithContext<Vec<KeyedAccount>> = self
            .call(
                "getTokenAccountsByOwner",
                serde_json::json!([owner, { "mint": mint }, { "encoding": "jsonParsed" }]),
            )
            .await?;
        Ok(accounts.value.into_iter().next().map(|a| a.pubkey))
    }
}

#[async_trait]
impl TokenProgram for RpcChain {
    async fn create_mint(&self, request: &CreateMintRequest) -> Result<String> {
        self.relay("relay_createMint", request).await
    }

    async fn get_or_create_associated_account(
        &self,
        request: &AssociatedAccountRequest,
    ) -> Result<String> {
        #[derive(Deserialize)]
        struct Account {
            address: String,
        }

        let params = serde_json::to_value(request).map_err(|e| {
            ChainError::invalid_response(format!("Failed to encode account request: {e}"))
        })?;
        let account: Account = self
            .submit("relay_getOrCreateAssociatedAccount", serde_json::json!([params]))
            .await?;
        Ok(account.address)
    }

    async fn mint_to(&self, request: &MintToRequest) -> Result<String> {
        self.relay("relay_mintTo", request).await
    }

    async fn set_authority(&self, request: &SetAuthorityRequest) -> Result<String> {
        self.relay("relay_setAuthority", request).await
    }
}

#[async_trait]
impl MetadataProgram for RpcChain {
    async fn create_metadata_account_v3(&self, request: &CreateMetadataRequest) -> Result<String> {
        self.relay("relay_createMetadataAccountV3", request).await
    }
}

#[async_trait]
impl PoolProgram for RpcChain {
    async fn create_pool(&self, request: &CreatePoolRequest) -> Result<CreatedPool> {
        let params = serde_json::to_value(request)
            .map_err(|e| ChainError::invalid_response(format!("Failed to encode pool request: {e}")))?;
        self.submit("relay_createPool", serde_json::json!([params])).await
    }

    async fn add_liquidity(&self, request: &AddLiquidityRequest) -> Result<String> {
        self.relay("relay_addLiquidity", request).await
    }

    async fn lock_liquidity(&self, request: &LockLiquidityRequest) -> Result<String> {
        self.relay("relay_lockLiquidity", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mint_request() -> MintToRequest {
        MintToRequest {
            payer: String::from("p"),
            mint: String::from("m"),
            destination: String::from("d"),
            authority: String::from("p"),
            amount: 500,
        }
    }

    async fn client(server: &MockServer) -> RpcChain {
        RpcChain::new(&server.uri())
            .unwrap()
            .with_retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_get_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "method": "getVersion" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 1,
                "result": { "solana-core": "1.18.22", "feature-set": 3_469_865_029_u64 }
            })))
            .mount(&server)
            .await;

        let version = client(&server).await.get_version().await.unwrap();
        assert_eq!(version, "1.18.22");
    }

    #[tokio::test]
    async fn test_get_balance_unwraps_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "method": "getBalance", "params": ["abc"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 1,
                "result": { "context": { "slot": 10 }, "value": 42_000 }
            })))
            .mount(&server)
            .await;

        assert_eq!(client(&server).await.get_balance("abc").await.unwrap(), 42_000);
    }

    #[tokio::test]
    async fn test_token_balance_parses_string_amount() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 1,
                "result": { "context": { "slot": 10 }, "value": { "amount": "5000", "decimals": 2 } }
            })))
            .mount(&server)
            .await;

        let balance = client(&server)
            .await
            .get_token_account_balance("acct")
            .await
            .unwrap();
        assert_eq!(balance, 5000);
    }

    #[tokio::test]
    async fn test_account_exists_null_value() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 1,
                "result": { "context": { "slot": 10 }, "value": null }
            })))
            .mount(&server)
            .await;

        assert!(!client(&server).await.account_exists("mint").await.unwrap());
    }

    #[tokio::test]
    async fn test_rpc_error_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 1,
                "error": { "code": -32602, "message": "Invalid param" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.get_slot().await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::Chain(ChainError::Rpc { code: -32602, .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(u64::from(MAX_RETRIES))
            .mount(&server)
            .await;

        let err = client(&server).await.get_slot().await.unwrap_err();
        assert!(matches!(err, DeployError::Chain(ChainError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_mint_to_forwards_to_relay() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "method": "relay_mintTo",
                "params": [{ "mint": "m", "destination": "d", "amount": 500 }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 1, "result": { "signature": "sig-1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let signature = client(&server).await.mint_to(&mint_request()).await.unwrap();
        assert_eq!(signature, "sig-1");
    }

    #[tokio::test]
    async fn test_write_timeout_is_not_resent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "method": "relay_mintTo" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "jsonrpc": "2.0", "id": 1, "result": { "signature": "late" }
                    }))
                    .set_delay(Duration::from_millis(1500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let rpc = RpcChain::with_timeout(&server.uri(), 1)
            .unwrap()
            .with_retry_delay(Duration::from_millis(1));
        let err = rpc.mint_to(&mint_request()).await.unwrap_err();

        assert!(matches!(err, DeployError::Chain(ChainError::NetworkError { .. })));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_write_resent_after_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 2, "result": { "signature": "sig-2" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let signature = client(&server).await.mint_to(&mint_request()).await.unwrap();
        assert_eq!(signature, "sig-2");
    }

    #[tokio::test]
    async fn test_write_server_error_is_not_resent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).await.mint_to(&mint_request()).await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::Chain(ChainError::RequestFailed { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_retry_after_header_is_honored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 2, "result": 77
            })))
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        let slot = client(&server).await.get_slot().await.unwrap();

        assert_eq!(slot, 77);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_uses_larger_of_base_and_retry_after() {
        let rpc = RpcChain::new("http://localhost:1")
            .unwrap()
            .with_retry_delay(Duration::from_millis(500));
        let limited = DeployError::Chain(ChainError::RateLimited { retry_after_secs: 2 });
        let unhinted = DeployError::Chain(ChainError::RateLimited { retry_after_secs: 0 });
        let network = DeployError::Chain(ChainError::network("reset"));

        assert_eq!(rpc.backoff(&limited, 1), Duration::from_secs(2));
        assert_eq!(rpc.backoff(&unhinted, 3), Duration::from_millis(1500));
        assert_eq!(rpc.backoff(&network, 2), Duration::from_secs(1));
    }
}
