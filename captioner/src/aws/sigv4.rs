//! AWS Signature Version 4 for JSON-RPC style POSTs to `/`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use object_store::aws::AwsCredential;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// A request to sign. Only the headers named here are covered by the signature.
pub(crate) struct SigningRequest<'a> {
    pub host: &'a str,
    pub content_type: &'a str,
    pub target: &'a str,
    pub payload: &'a [u8],
}

/// Headers to attach to a signed request, in addition to the ones signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Signature {
    pub amz_date: String,
    pub authorization: String,
    pub security_token: Option<String>,
}

/// Signs for one region and service. Credentials are passed per request;
/// temporary ones rotate during a run.
#[derive(Debug, Clone)]
pub(crate) struct Signer {
    region: String,
    service: &'static str,
}

impl Signer {
    pub fn new(region: &str, service: &'static str) -> Self {
        Self {
            region: region.to_string(),
            service,
        }
    }

    pub fn sign(
        &self,
        credentials: &AwsCredential,
        request: &SigningRequest<'_>,
        now: DateTime<Utc>,
    ) -> Signature {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let token = credentials.token.as_deref();

        // Sorted by header name.
        let mut headers = vec![
            ("content-type", request.content_type),
            ("host", request.host),
            ("x-amz-date", amz_date.as_str()),
        ];
        if let Some(token) = token {
            headers.push(("x-amz-security-token", token));
        }
        headers.push(("x-amz-target", request.target));

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{}\n", value.trim()))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";");
        let payload_hash = hex(&Sha256::digest(request.payload));

        let canonical_request =
            format!("POST\n/\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}");
        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex(&Sha256::digest(canonical_request.as_bytes()))
        );

        let key = self.signing_key(&credentials.secret_key, &date);
        let signature = hex(&hmac(&key, string_to_sign.as_bytes()));

        Signature {
            authorization: format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                credentials.key_id
            ),
            amz_date,
            security_token: token.map(str::to_string),
        }
    }

    fn signing_key(&self, secret_key: &str, date: &str) -> Vec<u8> {
        let secret = format!("AWS4{secret_key}");
        let k_date = hmac(secret.as_bytes(), date.as_bytes());
        let k_region = hmac(&k_date, self.region.as_bytes());
        let k_service = hmac(&k_region, self.service.as_bytes());
        hmac(&k_service, b"aws4_request")
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
