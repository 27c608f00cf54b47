//! AdmissionReview envelope decoding.
//!
//! The envelope is decoded in a self-describing way: `apiVersion` and `kind`
//! are read out of the body first and only then is the body interpreted as
//! an AdmissionReview. The candidate object is lifted out of the envelope
//! as raw JSON so that a malformed workload surfaces as a decode fault on a
//! correlated response rather than as a transport fault.

use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionReview};
use serde_json::Value;
use thiserror::Error;

/// The only media type accepted for review bodies
pub const JSON_MEDIA_TYPE: &str = "application/json";
/// API group of the AdmissionReview envelope
pub const ADMISSION_GROUP: &str = "admission.k8s.io";
/// Kind of the AdmissionReview envelope
pub const REVIEW_KIND: &str = "AdmissionReview";

/// Transport faults: the admission protocol was never validly entered.
///
/// These are answered with HTTP 400 and a plain-text body, never with a
/// review envelope.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("contentType={0}, expect application/json")]
    UnsupportedContentType(String),

    #[error("Request with no body")]
    EmptyBody,

    #[error("Request with unreadable body: {0}")]
    UnreadableBody(String),

    #[error("Request could not be decoded: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Request could not be decoded: Object 'apiVersion' or 'Kind' is missing")]
    MissingTypeMeta,

    #[error("unexpected object type, expected admission.k8s.io/AdmissionReview but got: {api_version}, Kind={kind}")]
    UnexpectedKind { api_version: String, kind: String },

    #[error("unsupported AdmissionReview version {0}")]
    UnsupportedVersion(String),

    #[error("AdmissionReview contains no request")]
    MissingRequest,
}

impl EnvelopeError {
    /// Short label used for metrics
    pub fn fault(&self) -> &'static str {
        match self {
            EnvelopeError::UnsupportedContentType(_) => "content_type",
            EnvelopeError::EmptyBody => "empty_body",
            EnvelopeError::UnreadableBody(_) => "unreadable_body",
            EnvelopeError::Malformed(_) => "malformed",
            EnvelopeError::MissingTypeMeta => "missing_type_meta",
            EnvelopeError::UnexpectedKind { .. } => "unexpected_kind",
            EnvelopeError::UnsupportedVersion(_) => "unsupported_version",
            EnvelopeError::MissingRequest => "missing_request",
        }
    }
}

/// A decoded inbound review.
///
/// `request` carries everything but the candidate object, which is kept in
/// `object` exactly as serialized by the caller.
#[derive(Debug)]
pub struct ReviewRequest {
    pub request: AdmissionRequest<DynamicObject>,
    pub object: Option<Vec<u8>>,
}

impl ReviewRequest {
    /// Correlation ID of the request
    pub fn uid(&self) -> &str {
        &self.request.uid
    }
}

/// Check the declared media type of a request.
///
/// Parameters such as `charset` are ignored and the comparison is
/// case-insensitive.
pub fn check_content_type(headers: &HeaderMap) -> Result<(), EnvelopeError> {
    let declared = headers
        .get(CONTENT_TYPE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();

    let media_type = declared.split(';').next().unwrap_or_default().trim();
    if media_type.eq_ignore_ascii_case(JSON_MEDIA_TYPE) {
        Ok(())
    } else {
        Err(EnvelopeError::UnsupportedContentType(declared))
    }
}

/// Decoder for AdmissionReview envelopes.
///
/// Constructed once at startup and shared read-only by all requests.
#[derive(Debug, Clone)]
pub struct ReviewDecoder {
    versions: Vec<String>,
}

impl Default for ReviewDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewDecoder {
    /// Decoder accepting `admission.k8s.io/v1` and `admission.k8s.io/v1beta1`
    pub fn new() -> Self {
        Self::with_versions(["v1", "v1beta1"])
    }

    /// Decoder accepting only the given envelope versions
    pub fn with_versions<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            versions: versions.into_iter().map(Into::into).collect(),
        }
    }

    /// Decode a review body into a request.
    pub fn decode(&self, body: &[u8]) -> Result<ReviewRequest, EnvelopeError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(EnvelopeError::EmptyBody);
        }

        let mut value: Value = serde_json::from_slice(body).map_err(EnvelopeError::Malformed)?;
        self.check_type(&value)?;

        // Lift the objects out before typed decoding; a null left behind
        // decodes as `None`.
        let object = value
            .pointer_mut("/request/object")
            .map(Value::take)
            .filter(|v| !v.is_null());
        if let Some(old) = value.pointer_mut("/request/oldObject") {
            old.take();
        }

        let review: AdmissionReview<DynamicObject> =
            serde_json::from_value(value).map_err(EnvelopeError::Malformed)?;
        let request: AdmissionRequest<DynamicObject> = review
            .try_into()
            .map_err(|_| EnvelopeError::MissingRequest)?;

        let object = object
            .map(|v| serde_json::to_vec(&v))
            .transpose()
            .map_err(EnvelopeError::Malformed)?;

        Ok(ReviewRequest { request, object })
    }

    fn check_type(&self, value: &Value) -> Result<(), EnvelopeError> {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        };
        let (Some(api_version), Some(kind)) = (field("apiVersion"), field("kind")) else {
            return Err(EnvelopeError::MissingTypeMeta);
        };

        let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
        if group != ADMISSION_GROUP || kind != REVIEW_KIND {
            return Err(EnvelopeError::UnexpectedKind {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
            });
        }
        if !self.versions.iter().any(|v| v == version) {
            return Err(EnvelopeError::UnsupportedVersion(api_version.to_string()));
        }
        Ok(())
    }
}
