//! AWS Signature Version 4 request signing, implemented from the canonical
//! definition rather than an SDK.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Inputs required to sign one request.
pub struct SigningParams<'a> {
    /// Access key identifier placed in the credential scope.
    pub access_key_id: &'a str,
    /// Secret key the signing key chain is derived from.
    pub secret_access_key: &'a str,
    /// Region component of the credential scope (`auto` for R2).
    pub region: &'a str,
    /// Uppercase HTTP method.
    pub method: &'a str,
    /// Value of the `Host` header.
    pub host: &'a str,
    /// URI path, already percent-encoded per SigV4 rules.
    pub canonical_path: &'a str,
    /// Canonical (sorted and encoded) query string, without the leading `?`.
    pub canonical_query: &'a str,
    /// Content type of the request body, when one is sent.
    pub content_type: Option<&'a str>,
    /// Hex SHA-256 of the payload.
    pub payload_hash: &'a str,
    /// Signing timestamp; injectable so signatures are reproducible.
    pub timestamp: DateTime<Utc>,
}

/// Sign a request, returning the headers to apply to it.
///
/// The `Host` header participates in the signature but is not returned: the
/// HTTP client derives it from the request URL.
pub fn sign_request(params: &SigningParams<'_>) -> Vec<(&'static str, String)> {
    let amz_date = params.timestamp.format("%Y%m%dT%H%M%SZ").to_string();
    let datestamp = params.timestamp.format("%Y%m%d").to_string();

    let mut headers = BTreeMap::new();
    if let Some(content_type) = params.content_type {
        headers.insert("content-type", content_type.to_string());
    }
    headers.insert("host", params.host.to_string());
    headers.insert("x-amz-content-sha256", params.payload_hash.to_string());
    headers.insert("x-amz-date", amz_date.clone());

    let request = canonical_request(
        params.method,
        params.canonical_path,
        params.canonical_query,
        &headers,
        params.payload_hash,
    );
    let scope = format!("{datestamp}/{}/{SERVICE}/aws4_request", params.region);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(request.text.as_bytes())
    );
    let key = signing_key(params.secret_access_key, &datestamp, params.region);
    let signature = hex::encode(hmac_bytes(&key, string_to_sign.as_bytes()));
    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
        params.access_key_id, request.signed_headers
    );

    let mut applied = vec![("authorization", authorization)];
    if let Some(content_type) = params.content_type {
        applied.push(("content-type", content_type.to_string()));
    }
    applied.push(("x-amz-content-sha256", params.payload_hash.to_string()));
    applied.push(("x-amz-date", amz_date));
    applied
}

/// Canonical request text plus the signed-headers list it was built with.
pub struct CanonicalRequest {
    /// Newline-joined canonical request.
    pub text: String,
    /// Semicolon-joined lowercase header names.
    pub signed_headers: String,
}

/// Assemble the canonical request from its pre-canonicalised pieces.
/// Header names must already be lowercase; the `BTreeMap` provides the
/// required sort order.
pub fn canonical_request(
    method: &str,
    canonical_path: &str,
    canonical_query: &str,
    headers: &BTreeMap<&'static str, String>,
    payload_hash: &str,
) -> CanonicalRequest {
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = headers.keys().copied().collect::<Vec<_>>().join(";");
    let text = format!(
        "{method}\n{canonical_path}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    );
    CanonicalRequest {
        text,
        signed_headers,
    }
}

/// Derive the signing key chain
/// `"AWS4" + secret → date → region → service → "aws4_request"`.
pub fn signing_key(secret_access_key: &str, datestamp: &str, region: &str) -> Vec<u8> {
    let k_date = hmac_bytes(format!("AWS4{secret_access_key}").as_bytes(), datestamp.as_bytes());
    let k_region = hmac_bytes(&k_date, region.as_bytes());
    let k_service = hmac_bytes(&k_region, SERVICE.as_bytes());
    hmac_bytes(&k_service, b"aws4_request")
}

/// Percent-encode a string per SigV4 rules: unreserved characters pass
/// through, `/` passes through only when `encode_slash` is false, and
/// everything else becomes uppercase `%XX`.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Build the canonical query string from name/value pairs.
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(name, value)| (uri_encode(name, true), uri_encode(value, true)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_bytes(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .expect("HMAC-SHA-256 accepts keys of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ACCESS_KEY: &str = "AKIDEXAMPLE";
    const SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn fixed_timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn uri_encoding_follows_sigv4_rules() {
        assert_eq!(
            uri_encode("artifacts/job 1/file~x.bin", false),
            "artifacts/job%201/file~x.bin"
        );
        assert_eq!(uri_encode("a+b/c", true), "a%2Bb%2Fc");
        assert_eq!(uri_encode("AZaz09-._~", true), "AZaz09-._~");
    }

    #[test]
    fn query_is_sorted_and_encoded() {
        let query = canonical_query(&[
            ("uploadId".to_string(), "abc def".to_string()),
            ("partNumber".to_string(), "7".to_string()),
        ]);
        assert_eq!(query, "partNumber=7&uploadId=abc%20def");
    }

    #[test]
    fn signing_key_matches_fixed_vector() {
        let key = signing_key(SECRET_KEY, "20240115", "auto");
        assert_eq!(
            hex::encode(key),
            "b7669ae45ec524336455bf809b19b4c8c686e63183d32c933039d66d653a53c6"
        );
    }

    #[test]
    fn canonical_request_has_the_documented_layout() {
        let payload_hash = sha256_hex(b"hello world");
        let mut headers = BTreeMap::new();
        headers.insert("content-type", "application/octet-stream".to_string());
        headers.insert("host", "account.r2.cloudflarestorage.com".to_string());
        headers.insert("x-amz-content-sha256", payload_hash.clone());
        headers.insert("x-amz-date", "20240115T120000Z".to_string());

        let request = canonical_request(
            "PUT",
            "/bucket/artifacts/job%201/file.bin",
            "",
            &headers,
            &payload_hash,
        );
        assert_eq!(
            request.signed_headers,
            "content-type;host;x-amz-content-sha256;x-amz-date"
        );
        let expected = format!(
            "PUT\n/bucket/artifacts/job%201/file.bin\n\n\
             content-type:application/octet-stream\n\
             host:account.r2.cloudflarestorage.com\n\
             x-amz-content-sha256:{payload_hash}\n\
             x-amz-date:20240115T120000Z\n\n\
             content-type;host;x-amz-content-sha256;x-amz-date\n{payload_hash}"
        );
        assert_eq!(request.text, expected);
    }

    #[test]
    fn full_signature_matches_fixed_vector() {
        let payload_hash = sha256_hex(b"hello world");
        assert_eq!(
            payload_hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        let headers = sign_request(&SigningParams {
            access_key_id: ACCESS_KEY,
            secret_access_key: SECRET_KEY,
            region: "auto",
            method: "PUT",
            host: "account.r2.cloudflarestorage.com",
            canonical_path: "/bucket/artifacts/job%201/file.bin",
            canonical_query: "",
            content_type: Some("application/octet-stream"),
            payload_hash: &payload_hash,
            timestamp: fixed_timestamp(),
        });

        let authorization = &headers
            .iter()
            .find(|(name, _)| *name == "authorization")
            .expect("authorization header")
            .1;
        assert_eq!(
            authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240115/auto/s3/aws4_request, \
             SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date, \
             Signature=b5d1a6a33e28e6b7e9e8c65d641fc0d094598194d0a50f4412701301009b10d6"
        );
        assert!(
            headers
                .iter()
                .any(|(name, value)| *name == "x-amz-date" && value == "20240115T120000Z")
        );
        assert!(
            headers.iter().all(|(name, _)| *name != "host"),
            "host is derived by the http client, not applied twice"
        );
    }

    #[test]
    fn signatures_are_deterministic() {
        let params = SigningParams {
            access_key_id: ACCESS_KEY,
            secret_access_key: SECRET_KEY,
            region: "auto",
            method: "GET",
            host: "example.test",
            canonical_path: "/bucket/key",
            canonical_query: "",
            content_type: None,
            payload_hash: &sha256_hex(b""),
            timestamp: fixed_timestamp(),
        };
        assert_eq!(sign_request(&params), sign_request(&params));
    }
}
