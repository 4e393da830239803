//! Client for the threshold-decryption gateway.
//!
//! Every decryption uses a fresh ephemeral key pair and an EIP-712
//! authorization signed by the persistent key. The plaintext returned by the
//! gateway is only accepted if it is a valid [Symbol].

use ethers::{
    core::k256::ecdsa::SigningKey,
    signers::{LocalWallet, Signer},
    types::{transaction::eip712::TypedData, U256},
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    fmt,
    future::Future,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use veilrps_types::{Address, CiphertextHandle, Symbol};

/// Upper bound for a single gateway round trip.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    #[error("gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("authorization failed: {0}")]
    Authorization(String),
    #[error("decrypted value out of range: {0}")]
    OutOfRange(u64),
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// Which authorization scheme the gateway speaks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecryptionProtocol {
    /// `UserDecryptRequestVerification` signed over the verifier's domain.
    #[default]
    UserDecrypt,
    /// `Reencrypt` signed over the target contract's domain.
    Reencrypt,
}

impl DecryptionProtocol {
    pub fn endpoint(self) -> &'static str {
        match self {
            DecryptionProtocol::UserDecrypt => "v1/user-decrypt",
            DecryptionProtocol::Reencrypt => "reencrypt",
        }
    }
}

/// One-time key pair generated for a single decryption.
pub struct EphemeralKeypair {
    public_key: Vec<u8>,
    private_key: Vec<u8>,
}

impl EphemeralKeypair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        Self {
            public_key,
            private_key: signing_key.to_bytes().to_vec(),
        }
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Secret half of the pair. Transports whose gateway returns a sealed
    /// plaintext open it with this key.
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }
}

impl fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeypair")
            .field("public_key", &hex::encode(&self.public_key))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Fields covered by the authorization signature.
///
/// Unset validity bounds are signed as zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
    pub contract: Address,
    pub public_key: Vec<u8>,
    pub start_timestamp: Option<u64>,
    pub duration_days: Option<u64>,
}

impl Authorization {
    /// Build the EIP-712 payload for `protocol`.
    pub fn typed_data(
        &self,
        protocol: DecryptionProtocol,
        chain_id: u64,
        verifier: Address,
    ) -> Result<TypedData, GatewayError> {
        let public_key = format!("0x{}", hex::encode(&self.public_key));
        let domain_fields = json!([
            { "name": "name", "type": "string" },
            { "name": "version", "type": "string" },
            { "name": "chainId", "type": "uint256" },
            { "name": "verifyingContract", "type": "address" },
        ]);
        let payload = match protocol {
            DecryptionProtocol::UserDecrypt => json!({
                "types": {
                    "EIP712Domain": domain_fields,
                    "UserDecryptRequestVerification": [
                        { "name": "publicKey", "type": "bytes" },
                        { "name": "contractAddresses", "type": "address[]" },
                        { "name": "startTimestamp", "type": "uint256" },
                        { "name": "durationDays", "type": "uint256" },
                    ],
                },
                "primaryType": "UserDecryptRequestVerification",
                "domain": {
                    "name": "Decryption",
                    "version": "1",
                    "chainId": chain_id,
                    "verifyingContract": verifier.to_string(),
                },
                "message": {
                    "publicKey": public_key,
                    "contractAddresses": [self.contract.to_string()],
                    "startTimestamp": self.start_timestamp.unwrap_or(0).to_string(),
                    "durationDays": self.duration_days.unwrap_or(0).to_string(),
                },
            }),
            DecryptionProtocol::Reencrypt => json!({
                "types": {
                    "EIP712Domain": domain_fields,
                    "Reencrypt": [
                        { "name": "publicKey", "type": "bytes" },
                    ],
                },
                "primaryType": "Reencrypt",
                "domain": {
                    "name": "Authorization token",
                    "version": "1",
                    "chainId": chain_id,
                    "verifyingContract": self.contract.to_string(),
                },
                "message": {
                    "publicKey": public_key,
                },
            }),
        };
        serde_json::from_value(payload).map_err(|err| GatewayError::Authorization(err.to_string()))
    }
}

/// An authorization together with the signer's signature over it.
#[derive(Clone, Debug)]
pub struct SignedAuthorization {
    pub authorization: Authorization,
    pub signer: Address,
    /// 65-byte `r || s || v` signature.
    pub signature: Vec<u8>,
}

/// Everything the gateway needs to release one plaintext.
#[derive(Debug)]
pub struct DecryptionRequest {
    pub protocol: DecryptionProtocol,
    pub chain_id: u64,
    pub handle: CiphertextHandle,
    pub keypair: EphemeralKeypair,
    pub authorization: SignedAuthorization,
}

/// Wire transport for decryption requests.
pub trait GatewayTransport: Send + Sync + 'static {
    /// Submit `request` and return the raw plaintext.
    fn submit(
        &self,
        request: DecryptionRequest,
    ) -> impl Future<Output = Result<u64, GatewayError>> + Send;
}

/// Anything that can turn a move handle into a symbol.
pub trait Decryptor: Send + Sync + 'static {
    fn decrypt(
        &self,
        handle: CiphertextHandle,
    ) -> impl Future<Output = Result<Symbol, GatewayError>> + Send;
}

/// Settings for [GatewayClient].
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub protocol: DecryptionProtocol,
    /// Verifying contract for [DecryptionProtocol::UserDecrypt] authorizations.
    pub verifier: Address,
    pub validity_days: Option<u64>,
    pub timeout: Duration,
}

/// Decrypts move handles of one contract on behalf of one signer.
#[derive(Clone)]
pub struct GatewayClient<T> {
    transport: T,
    signer: LocalWallet,
    contract: Address,
    config: GatewayConfig,
}

impl<T: GatewayTransport> GatewayClient<T> {
    /// `signer` must already carry the ledger's chain id.
    pub fn new(
        transport: T,
        signer: LocalWallet,
        contract: Address,
        config: GatewayConfig,
    ) -> Self {
        Self {
            transport,
            signer,
            contract,
            config,
        }
    }

    /// Sign an authorization for `public_key`, valid from now.
    pub async fn authorize(&self, public_key: &[u8]) -> Result<SignedAuthorization, GatewayError> {
        let authorization = Authorization {
            contract: self.contract,
            public_key: public_key.to_vec(),
            start_timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .ok()
                .map(|elapsed| elapsed.as_secs()),
            duration_days: self.config.validity_days,
        };
        let typed = authorization.typed_data(
            self.config.protocol,
            self.signer.chain_id(),
            self.config.verifier,
        )?;
        let signature = self
            .signer
            .sign_typed_data(&typed)
            .await
            .map_err(|err| GatewayError::Authorization(err.to_string()))?;
        Ok(SignedAuthorization {
            authorization,
            signer: Address(self.signer.address().0),
            signature: signature.to_vec(),
        })
    }

    /// Decrypt `handle` without checking the symbol domain.
    pub async fn decrypt_raw(&self, handle: CiphertextHandle) -> Result<u64, GatewayError> {
        let keypair = EphemeralKeypair::generate();
        let authorization = self.authorize(keypair.public_key()).await?;
        let request = DecryptionRequest {
            protocol: self.config.protocol,
            chain_id: self.signer.chain_id(),
            handle,
            keypair,
            authorization,
        };
        debug!(%handle, protocol = ?self.config.protocol, "requesting decryption");
        match tokio::time::timeout(self.config.timeout, self.transport.submit(request)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Unavailable(format!(
                "no response within {}ms",
                self.config.timeout.as_millis()
            ))),
        }
    }
}

impl<T: GatewayTransport> Decryptor for GatewayClient<T> {
    async fn decrypt(&self, handle: CiphertextHandle) -> Result<Symbol, GatewayError> {
        let plaintext = self.decrypt_raw(handle).await?;
        Symbol::try_from(plaintext).map_err(|_| {
            warn!(%handle, plaintext, "decrypted value outside symbol domain");
            GatewayError::OutOfRange(plaintext)
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HandleContractPair {
    handle: String,
    contract_address: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestValidity {
    start_timestamp: String,
    duration_days: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDecryptBody {
    handle_contract_pairs: Vec<HandleContractPair>,
    request_validity: RequestValidity,
    contracts_chain_id: String,
    contract_addresses: Vec<String>,
    user_address: String,
    signature: String,
    public_key: String,
}

#[derive(Serialize)]
struct ReencryptBody {
    signature: String,
    client_address: String,
    enc_key: String,
    ciphertext_handle: String,
    eip712_verifying_contract: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestBody {
    UserDecrypt(UserDecryptBody),
    Reencrypt(ReencryptBody),
}

#[derive(Deserialize)]
struct DecryptResponse {
    #[serde(alias = "response")]
    plaintext: Value,
}

/// [GatewayTransport] over HTTP+JSON.
#[derive(Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Unavailable(err.to_string()))?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, protocol: DecryptionProtocol) -> Result<Url, GatewayError> {
        join_endpoint(&self.base_url, protocol.endpoint())
            .map_err(|err| GatewayError::Unavailable(format!("invalid gateway url: {err}")))
    }

    fn body(request: &DecryptionRequest) -> RequestBody {
        let authorization = &request.authorization;
        let signed = &authorization.authorization;
        let signature = hex::encode(&authorization.signature);
        let public_key = hex::encode(request.keypair.public_key());
        match request.protocol {
            DecryptionProtocol::UserDecrypt => RequestBody::UserDecrypt(UserDecryptBody {
                handle_contract_pairs: vec![HandleContractPair {
                    handle: request.handle.to_string(),
                    contract_address: signed.contract.to_string(),
                }],
                request_validity: RequestValidity {
                    start_timestamp: signed.start_timestamp.unwrap_or(0).to_string(),
                    duration_days: signed.duration_days.unwrap_or(0).to_string(),
                },
                contracts_chain_id: request.chain_id.to_string(),
                contract_addresses: vec![signed.contract.to_string()],
                user_address: authorization.signer.to_string(),
                signature,
                public_key,
            }),
            DecryptionProtocol::Reencrypt => RequestBody::Reencrypt(ReencryptBody {
                signature,
                client_address: authorization.signer.to_string(),
                enc_key: public_key,
                ciphertext_handle: request.handle.to_string(),
                eip712_verifying_contract: signed.contract.to_string(),
            }),
        }
    }
}

impl GatewayTransport for HttpGateway {
    async fn submit(&self, request: DecryptionRequest) -> Result<u64, GatewayError> {
        let url = self.endpoint(request.protocol)?;
        let response = self
            .http
            .post(url)
            .json(&Self::body(&request))
            .send()
            .await
            .map_err(|err| GatewayError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::Unavailable(format!("status {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: DecryptResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::InvalidResponse(err.to_string()))?;
        parse_plaintext(&body.plaintext).ok_or_else(|| {
            GatewayError::InvalidResponse(format!("unexpected plaintext {}", body.plaintext))
        })
    }
}

/// Resolve `path` under `base`, keeping any path segment `base` already has.
pub(crate) fn join_endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(path)
}

/// Accept a JSON number, a decimal string or a 0x-prefixed hex string.
///
/// Values wider than `u64` saturate so they still fail the symbol check.
fn parse_plaintext(value: &Value) -> Option<u64> {
    let wide = match value {
        Value::Number(number) => match number.as_u64() {
            Some(value) => return Some(value),
            None => number
                .as_f64()
                .filter(|value| value.is_finite() && *value >= 0.0 && value.fract() == 0.0)
                .map(|_| U256::MAX)?,
        },
        Value::String(text) => {
            let text = text.trim();
            match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                Some(hex) if !hex.is_empty() => U256::from_str_radix(hex, 16).ok()?,
                Some(_) => return None,
                None if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
                    U256::from_dec_str(text).ok()?
                }
                None => return None,
            }
        }
        _ => return None,
    };
    Some(if wide > U256::from(u64::MAX) {
        u64::MAX
    } else {
        wide.as_u64()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use ethers::types::{transaction::eip712::Eip712, H256};
    use std::net::SocketAddr;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn signer() -> LocalWallet {
        KEY.parse::<LocalWallet>().unwrap().with_chain_id(11_155_111u64)
    }

    fn config(protocol: DecryptionProtocol, timeout: Duration) -> GatewayConfig {
        GatewayConfig {
            protocol,
            verifier: Address([0x5d; 20]),
            validity_days: Some(1),
            timeout,
        }
    }

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    fn client(
        url: Url,
        protocol: DecryptionProtocol,
        timeout: Duration,
    ) -> GatewayClient<HttpGateway> {
        GatewayClient::new(
            HttpGateway::new(url, timeout).unwrap(),
            signer(),
            Address([0x11; 20]),
            config(protocol, timeout),
        )
    }

    #[test]
    fn test_missing_validity_fields_sign_as_zero() {
        let authorization = Authorization {
            contract: Address([0x11; 20]),
            public_key: vec![4; 65],
            start_timestamp: None,
            duration_days: None,
        };
        let typed = authorization
            .typed_data(DecryptionProtocol::UserDecrypt, 1, Address([0x5d; 20]))
            .unwrap();
        assert_eq!(typed.message["startTimestamp"], json!("0"));
        assert_eq!(typed.message["durationDays"], json!("0"));
        assert!(typed.encode_eip712().is_ok());
    }

    #[test]
    fn test_reencrypt_domain_targets_contract() {
        let authorization = Authorization {
            contract: Address([0x11; 20]),
            public_key: vec![4; 65],
            start_timestamp: None,
            duration_days: None,
        };
        let typed = authorization
            .typed_data(DecryptionProtocol::Reencrypt, 1, Address([0x5d; 20]))
            .unwrap();
        assert_eq!(typed.primary_type, "Reencrypt");
        assert_eq!(typed.domain.name.as_deref(), Some("Authorization token"));
        assert_eq!(
            typed.domain.verifying_contract,
            Some(ethers::types::Address::repeat_byte(0x11))
        );
    }

    #[tokio::test]
    async fn test_authorization_recovers_signer() {
        let gateway = client(
            Url::parse("http://127.0.0.1:1/").unwrap(),
            DecryptionProtocol::UserDecrypt,
            DEFAULT_GATEWAY_TIMEOUT,
        );
        let keypair = EphemeralKeypair::generate();
        let signed = gateway.authorize(keypair.public_key()).await.unwrap();
        assert_eq!(signed.signature.len(), 65);
        assert!(signed.authorization.start_timestamp.is_some());

        let typed = signed
            .authorization
            .typed_data(DecryptionProtocol::UserDecrypt, 11_155_111, Address([0x5d; 20]))
            .unwrap();
        let digest = typed.encode_eip712().unwrap();
        let signature = ethers::types::Signature::try_from(signed.signature.as_slice()).unwrap();
        let recovered = signature.recover(H256::from(digest)).unwrap();
        assert_eq!(recovered, signer().address());
        assert_eq!(signed.signer, Address(signer().address().0));
    }

    #[test]
    fn test_ephemeral_keys_are_fresh() {
        let first = EphemeralKeypair::generate();
        let second = EphemeralKeypair::generate();
        assert_eq!(first.public_key().len(), 65);
        assert_ne!(first.public_key(), second.public_key());
        assert!(!format!("{first:?}").contains(&hex::encode(first.private_key())));
    }

    #[tokio::test]
    async fn test_decrypt_user_decrypt() {
        let router = Router::new().route(
            "/v1/user-decrypt",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["contractAddresses"][0], json!(Address([0x11; 20]).to_string()));
                assert_eq!(body["contractsChainId"], json!("11155111"));
                Json(json!({ "plaintext": 2 }))
            }),
        );
        let url = serve(router).await;
        let gateway = client(url, DecryptionProtocol::UserDecrypt, DEFAULT_GATEWAY_TIMEOUT);
        let symbol = gateway.decrypt(CiphertextHandle([7; 32])).await.unwrap();
        assert_eq!(symbol, Symbol::Scissors);
    }

    #[tokio::test]
    async fn test_decrypt_reencrypt_accepts_hex_response() {
        let router = Router::new().route(
            "/reencrypt",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["ciphertext_handle"], json!(CiphertextHandle([7; 32]).to_string()));
                Json(json!({ "response": "0x01" }))
            }),
        );
        let url = serve(router).await;
        let gateway = client(url, DecryptionProtocol::Reencrypt, DEFAULT_GATEWAY_TIMEOUT);
        let symbol = gateway.decrypt(CiphertextHandle([7; 32])).await.unwrap();
        assert_eq!(symbol, Symbol::Paper);
    }

    #[tokio::test]
    async fn test_decrypt_out_of_range() {
        let router = Router::new().route(
            "/v1/user-decrypt",
            post(|| async { Json(json!({ "plaintext": 5 })) }),
        );
        let url = serve(router).await;
        let gateway = client(url, DecryptionProtocol::UserDecrypt, DEFAULT_GATEWAY_TIMEOUT);
        let err = gateway.decrypt(CiphertextHandle([7; 32])).await.unwrap_err();
        assert!(matches!(err, GatewayError::OutOfRange(5)));
    }

    #[tokio::test]
    async fn test_decrypt_wide_plaintext_is_out_of_range() {
        let router = Router::new().route(
            "/v1/user-decrypt",
            post(|| async { Json(json!({ "plaintext": "18446744073709551616" })) }),
        );
        let url = serve(router).await;
        let gateway = client(url, DecryptionProtocol::UserDecrypt, DEFAULT_GATEWAY_TIMEOUT);
        let err = gateway.decrypt(CiphertextHandle([7; 32])).await.unwrap_err();
        assert!(matches!(err, GatewayError::OutOfRange(u64::MAX)));
    }

    #[tokio::test]
    async fn test_decrypt_server_error_is_unavailable() {
        let router = Router::new().route(
            "/v1/user-decrypt",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let url = serve(router).await;
        let gateway = client(url, DecryptionProtocol::UserDecrypt, DEFAULT_GATEWAY_TIMEOUT);
        let err = gateway.decrypt(CiphertextHandle([7; 32])).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_decrypt_client_error_is_rejected() {
        let router = Router::new().route(
            "/v1/user-decrypt",
            post(|| async { (StatusCode::FORBIDDEN, "not allowed") }),
        );
        let url = serve(router).await;
        let gateway = client(url, DecryptionProtocol::UserDecrypt, DEFAULT_GATEWAY_TIMEOUT);
        let err = gateway.decrypt(CiphertextHandle([7; 32])).await.unwrap_err();
        match err {
            GatewayError::Rejected { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "not allowed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_decrypt_timeout_is_unavailable() {
        let router = Router::new().route(
            "/v1/user-decrypt",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "plaintext": 0 }))
            }),
        );
        let url = serve(router).await;
        let gateway = client(url, DecryptionProtocol::UserDecrypt, Duration::from_millis(100));
        let err = gateway.decrypt(CiphertextHandle([7; 32])).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_decrypt_malformed_response() {
        let router = Router::new().route(
            "/v1/user-decrypt",
            post(|| async { Json(json!({ "plaintext": [1, 2] })) }),
        );
        let url = serve(router).await;
        let gateway = client(url, DecryptionProtocol::UserDecrypt, DEFAULT_GATEWAY_TIMEOUT);
        let err = gateway.decrypt(CiphertextHandle([7; 32])).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }

    #[test]
    fn test_join_endpoint_keeps_base_path() {
        let base = Url::parse("https://relayer.example/api").unwrap();
        assert_eq!(
            join_endpoint(&base, "v1/user-decrypt").unwrap().as_str(),
            "https://relayer.example/api/v1/user-decrypt"
        );
        let base = Url::parse("https://relayer.example/").unwrap();
        assert_eq!(
            join_endpoint(&base, "reencrypt").unwrap().as_str(),
            "https://relayer.example/reencrypt"
        );
    }

    #[test]
    fn test_parse_plaintext_formats() {
        assert_eq!(parse_plaintext(&json!(1)), Some(1));
        assert_eq!(parse_plaintext(&json!("2")), Some(2));
        assert_eq!(parse_plaintext(&json!("0x0a")), Some(10));
        assert_eq!(parse_plaintext(&json!(null)), None);
        assert_eq!(parse_plaintext(&json!(-1)), None);
        assert_eq!(parse_plaintext(&json!("0X02")), Some(2));
        assert_eq!(parse_plaintext(&json!("rock")), None);
        assert_eq!(parse_plaintext(&json!("0x")), None);
    }

    #[test]
    fn test_parse_plaintext_saturates_wide_values() {
        assert_eq!(parse_plaintext(&json!("18446744073709551616")), Some(u64::MAX));
        assert_eq!(parse_plaintext(&json!(format!("0x{}", "ff".repeat(32)))), Some(u64::MAX));
        assert_eq!(parse_plaintext(&json!(1e30)), Some(u64::MAX));
    }
}
