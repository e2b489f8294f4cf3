//! Signed request dispatch.
//!
//! One linear pipeline per call: resolve endpoint, build the URL, attach
//! headers, canonicalize, sign, transmit, classify. No retries live here;
//! retry/backoff is a caller concern, since implicit retries would change
//! idempotency assumptions for one-shot admin calls.

use crate::canonical::canonical_request;
use crate::sign::{authorization, ChainKey};
use crate::{
    header, AuthInfo, ChallengeInfo, EndpointResolver, RequestMeta,
    SpAuthError, SpAuthResult, SpRegistry, EMPTY_BODY_SHA256,
};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH,
    CONTENT_TYPE, RANGE,
};
use reqwest::Response;
use url::Url;

/// Admin path for proof-of-storage challenges.
pub const ADMIN_CHALLENGE_PATH: &str = "/greenfield/admin/v1/challenge";

/// Admin path for approval (countersign) flows.
pub const ADMIN_GET_APPROVAL_PATH: &str = "/greenfield/admin/v1/get-approval";

/// Content type attached when the caller supplies none. Every signed
/// request carries `Content-Type`; it is part of the signed header set.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Result of a proof-of-storage challenge against an SP.
#[derive(Debug)]
pub struct ChallengeResult {
    /// Integrity hash of the challenged piece, from the response headers.
    pub integrity_hash: String,
    /// Comma-separated piece hashes of the object.
    pub piece_hashes: String,
    /// Raw piece payload.
    pub piece_data: Vec<u8>,
}

/// Client for authenticated storage provider requests.
///
/// Owns the endpoint cache; separate client instances never share
/// mutable state.
pub struct SpClient {
    http: reqwest::Client,
    resolver: EndpointResolver,
    key: Option<ChainKey>,
}

impl SpClient {
    /// Build a client over a registry handle. The chain key is optional;
    /// without one only authTypeV2 requests can be signed.
    pub fn new(
        registry: SpRegistry,
        key: Option<ChainKey>,
    ) -> SpAuthResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(SpAuthError::other)?;
        Ok(Self {
            http,
            resolver: EndpointResolver::new(registry),
            key,
        })
    }

    /// Build a client and prime the endpoint cache with one registry
    /// enumeration.
    pub async fn connect(
        registry: SpRegistry,
        key: Option<ChainKey>,
    ) -> SpAuthResult<Self> {
        let client = Self::new(registry, key)?;
        client.resolver.prime().await?;
        Ok(client)
    }

    /// The endpoint resolver backing this client.
    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// Send one signed request to an SP.
    ///
    /// On 2xx the raw response is returned and the caller owns the body.
    /// Dropping the returned future aborts an in-flight transmit.
    pub async fn send(
        &self,
        sp_address: &str,
        meta: &RequestMeta,
        auth: &AuthInfo,
    ) -> SpAuthResult<Response> {
        let base = self.resolver.resolve(sp_address).await?;
        let url = build_url(&base, meta)?;

        let mut headers = HeaderMap::new();
        attach_headers(&mut headers, meta)?;

        // headers are final past this point; the timestamp is covered by
        // the canonical headers block, so signing must come last
        let canonical = canonical_request(&meta.method, &url, &headers);
        let auth_value = authorization(&canonical, auth, self.key.as_ref())?;
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(SpAuthError::other)?,
        );

        tracing::debug!(%url, method = %meta.method, "dispatching sp request");
        let request = self
            .http
            .request(meta.method.clone(), url)
            .headers(headers)
            .build()
            .map_err(SpAuthError::other)?;
        let response = self
            .http
            .execute(request)
            .await
            .map_err(classify_transport)?;

        classify_response(response).await
    }

    /// Ask an SP to countersign a prepared transaction message.
    ///
    /// Returns the value of the `X-Gnfd-Signed-Msg` response header.
    pub async fn get_approval(
        &self,
        sp_address: &str,
        action: &str,
        unsigned_msg_hex: &str,
        auth: &AuthInfo,
    ) -> SpAuthResult<String> {
        let meta = RequestMeta {
            admin_path: ADMIN_GET_APPROVAL_PATH.to_string(),
            query: vec![("action".to_string(), action.to_string())],
            unsigned_msg: Some(unsigned_msg_hex.to_string()),
            ..Default::default()
        };
        let response = self.send(sp_address, &meta, auth).await?;
        header_string(&response, header::GNFD_SIGNED_MSG)
    }

    /// Challenge an SP for integrity proof of one object piece.
    pub async fn challenge(
        &self,
        sp_address: &str,
        challenge: ChallengeInfo,
        auth: &AuthInfo,
    ) -> SpAuthResult<ChallengeResult> {
        let meta = RequestMeta {
            admin_path: ADMIN_CHALLENGE_PATH.to_string(),
            challenge: Some(challenge),
            ..Default::default()
        };
        let response = self.send(sp_address, &meta, auth).await?;
        let integrity_hash =
            header_string(&response, header::GNFD_INTEGRITY_HASH)?;
        let piece_hashes =
            header_string(&response, header::GNFD_PIECE_HASH)?;
        let piece_data = response
            .bytes()
            .await
            .map_err(classify_transport)?
            .to_vec();
        Ok(ChallengeResult {
            integrity_hash,
            piece_hashes,
            piece_data,
        })
    }
}

fn header_string(
    response: &Response,
    name: &'static str,
) -> SpAuthResult<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| {
            SpAuthError::from(format!("sp response missing {} header", name))
        })
}

/// Join the SP base URL with the request path and query.
fn build_url(base: &Url, meta: &RequestMeta) -> SpAuthResult<Url> {
    let path = if !meta.admin_path.is_empty() {
        meta.admin_path.clone()
    } else {
        match (&meta.bucket_name, &meta.object_name) {
            (Some(bucket), Some(object)) => {
                format!("/{}/{}", bucket, object)
            }
            (Some(bucket), None) => format!("/{}", bucket),
            _ => "/".to_string(),
        }
    };
    let mut url = base.join(&path).map_err(SpAuthError::other)?;
    if !meta.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in &meta.query {
            pairs.append_pair(k, v);
        }
    }
    Ok(url)
}

/// Set every non-Authorization header the request needs, including the
/// freshly generated timestamp.
fn attach_headers(
    headers: &mut HeaderMap,
    meta: &RequestMeta,
) -> SpAuthResult<()> {
    insert(headers, header::GNFD_DATE, &gnfd_date_now()?)?;
    insert(
        headers,
        header::GNFD_CONTENT_SHA256,
        meta.content_sha256.as_deref().unwrap_or(EMPTY_BODY_SHA256),
    )?;
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(
            meta.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE),
        )
        .map_err(SpAuthError::other)?,
    );
    if let Some(len) = meta.content_length {
        headers.insert(
            CONTENT_LENGTH,
            HeaderValue::from_str(&len.to_string())
                .map_err(SpAuthError::other)?,
        );
    }
    if let Some(md5) = &meta.content_md5 {
        insert(headers, "Content-MD5", md5)?;
    }
    if let Some((start, end)) = meta.range {
        let value = match end {
            Some(end) => format!("bytes={}-{}", start, end),
            None => format!("bytes={}-", start),
        };
        headers.insert(
            RANGE,
            HeaderValue::from_str(&value).map_err(SpAuthError::other)?,
        );
    }
    if let Some(unsigned_msg) = &meta.unsigned_msg {
        insert(headers, header::GNFD_UNSIGNED_MSG, unsigned_msg)?;
    }
    if let Some(challenge) = &meta.challenge {
        insert(headers, header::GNFD_OBJECT_ID, &challenge.object_id)?;
        insert(
            headers,
            header::GNFD_PIECE_INDEX,
            &challenge.piece_index.to_string(),
        )?;
        insert(
            headers,
            header::GNFD_REDUNDANCY_INDEX,
            &challenge.redundancy_index.to_string(),
        )?;
    }
    Ok(())
}

fn insert(
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
) -> SpAuthResult<()> {
    headers.insert(
        HeaderName::from_bytes(name.as_bytes())
            .map_err(SpAuthError::other)?,
        HeaderValue::from_str(value).map_err(SpAuthError::other)?,
    );
    Ok(())
}

/// Current UTC time, ISO-8601 at second precision.
fn gnfd_date_now() -> SpAuthResult<String> {
    let fmt = time::macros::format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
    );
    time::OffsetDateTime::now_utc()
        .format(&fmt)
        .map_err(SpAuthError::other)
}

/// Translate a reqwest transmit failure, distinguishing transient
/// conditions (reset / EOF / timeout) the caller may retry from
/// everything else.
fn classify_transport(e: reqwest::Error) -> SpAuthError {
    if e.is_timeout() || e.is_connect() {
        return SpAuthError::Transport(e.to_string());
    }
    let mut source = std::error::Error::source(&e);
    while let Some(s) = source {
        if let Some(io) = s.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::TimedOut => {
                    return SpAuthError::Transport(e.to_string());
                }
                _ => {}
            }
        }
        source = std::error::Error::source(s);
    }
    SpAuthError::other(e)
}

async fn classify_response(response: Response) -> SpAuthResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(parse_error_body(status.as_u16(), &body))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: String,
}

/// Parse an SP error body; anything that isn't the structured XML shape
/// degrades to the stable "unknown error" form.
fn parse_error_body(status: u16, body: &str) -> SpAuthError {
    match quick_xml::de::from_str::<XmlErrorBody>(body) {
        // an xml body without Code or Message is not the structured
        // shape, whatever element happened to be at its root
        Ok(parsed)
            if !parsed.code.is_empty() || !parsed.message.is_empty() =>
        {
            SpAuthError::Protocol {
                status,
                code: parsed.code,
                message: parsed.message,
                request_id: parsed.request_id,
            }
        }
        _ => SpAuthError::Unclassified {
            status,
            body: body.to_string(),
        },
    }
}
