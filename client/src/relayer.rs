//! HTTP adapter for the input-proof relayer.

use crate::{
    codec::{EncryptError, EncryptedMove, EncryptionContext, Encryptor},
    gateway::join_endpoint,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;
use veilrps_types::CiphertextHandle;

/// Width of an encrypted move in bits.
const MOVE_BITS: u8 = 8;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputProofRequest {
    contract_address: String,
    user_address: String,
    bits: u8,
    value: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputProofResponse {
    handle: String,
    input_proof: String,
}

/// [Encryptor] that asks a relayer for a bound ciphertext and input proof.
#[derive(Clone)]
pub struct RelayerEncryptor {
    http: reqwest::Client,
    endpoint: Url,
}

impl RelayerEncryptor {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, EncryptError> {
        let endpoint = join_endpoint(base_url, "v1/input-proof")
            .map_err(|err| EncryptError::Unavailable(format!("invalid relayer url: {err}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| EncryptError::Unavailable(err.to_string()))?;
        Ok(Self { http, endpoint })
    }
}

impl Encryptor for RelayerEncryptor {
    async fn encrypt(
        &self,
        value: u8,
        context: EncryptionContext,
    ) -> Result<EncryptedMove, EncryptError> {
        let request = InputProofRequest {
            contract_address: context.contract.to_string(),
            user_address: context.submitter.to_string(),
            bits: MOVE_BITS,
            value,
        };
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| EncryptError::Unavailable(err.to_string()))?;
        let status = response.status();
        if status.is_server_error() {
            return Err(EncryptError::Unavailable(format!("status {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EncryptError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        let body: InputProofResponse = response
            .json()
            .await
            .map_err(|err| EncryptError::InvalidResponse(err.to_string()))?;

        let handle: CiphertextHandle = body
            .handle
            .parse()
            .map_err(|err| EncryptError::InvalidResponse(format!("handle: {err}")))?;
        let proof = hex::decode(body.input_proof.trim_start_matches("0x"))
            .map_err(|err| EncryptError::InvalidResponse(format!("input proof: {err}")))?;
        debug!(%handle, proof_len = proof.len(), "received input proof");
        Ok(EncryptedMove { handle, proof })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use veilrps_types::Address;

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    fn context() -> EncryptionContext {
        EncryptionContext {
            contract: Address([0x11; 20]),
            submitter: Address([0x22; 20]),
        }
    }

    #[tokio::test]
    async fn test_encrypt_passes_binding_through() {
        let router = Router::new().route(
            "/v1/input-proof",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["contractAddress"], json!(Address([0x11; 20]).to_string()));
                assert_eq!(body["userAddress"], json!(Address([0x22; 20]).to_string()));
                assert_eq!(body["bits"], json!(8));
                assert_eq!(body["value"], json!(1));
                Json(json!({
                    "handle": format!("0x{}", "ab".repeat(32)),
                    "inputProof": "0x0102ff",
                }))
            }),
        );
        let url = serve(router).await;
        let encryptor = RelayerEncryptor::new(&url, Duration::from_secs(5)).unwrap();
        let encrypted = encryptor.encrypt(1, context()).await.unwrap();
        assert_eq!(encrypted.handle, CiphertextHandle([0xab; 32]));
        assert_eq!(encrypted.calldata(), vec![0x01, 0x02, 0xff]);
    }

    #[tokio::test]
    async fn test_encrypt_keeps_base_path() {
        let router = Router::new().route(
            "/relayer/v1/input-proof",
            post(|| async {
                Json(json!({
                    "handle": format!("0x{}", "cd".repeat(32)),
                    "inputProof": "0x01",
                }))
            }),
        );
        let url = serve(router).await.join("relayer").unwrap();
        let encryptor = RelayerEncryptor::new(&url, Duration::from_secs(5)).unwrap();
        let encrypted = encryptor.encrypt(2, context()).await.unwrap();
        assert_eq!(encrypted.handle, CiphertextHandle([0xcd; 32]));
    }

    #[tokio::test]
    async fn test_encrypt_rejects_bad_handle() {
        let router = Router::new().route(
            "/v1/input-proof",
            post(|| async { Json(json!({ "handle": "0x1234", "inputProof": "0x" })) }),
        );
        let url = serve(router).await;
        let encryptor = RelayerEncryptor::new(&url, Duration::from_secs(5)).unwrap();
        let err = encryptor.encrypt(0, context()).await.unwrap_err();
        assert!(matches!(err, EncryptError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_encrypt_server_error() {
        let router = Router::new().route(
            "/v1/input-proof",
            post(|| async { StatusCode::BAD_GATEWAY }),
        );
        let url = serve(router).await;
        let encryptor = RelayerEncryptor::new(&url, Duration::from_secs(5)).unwrap();
        let err = encryptor.encrypt(0, context()).await.unwrap_err();
        assert!(matches!(err, EncryptError::Unavailable(_)));
    }
}
