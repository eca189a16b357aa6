//! HTTP status classification.
//!
//! This module provides [`StatusError`], the named view of an unsuccessful
//! HTTP status. Validators produce it and retry policies match on it.

use std::str::FromStr;

use http::StatusCode;

/// A failed HTTP status, classified by family.
///
/// Well-known 4xx and 5xx codes map to named variants. Anything else that is
/// not considered successful maps to [`StatusError::Unknown`] carrying the raw
/// code, so callers never lose the original value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum StatusError {
    #[error("bad request")]
    BadRequest,
    #[error("unauthorized")]
    Unauthorized,
    #[error("payment required")]
    PaymentRequired,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("not acceptable")]
    NotAcceptable,
    #[error("proxy authentication required")]
    ProxyAuthenticationRequired,
    #[error("request timeout")]
    RequestTimeout,
    #[error("conflict")]
    Conflict,
    #[error("gone")]
    Gone,
    #[error("length required")]
    LengthRequired,
    #[error("precondition failed")]
    PreconditionFailed,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("uri too long")]
    UriTooLong,
    #[error("unsupported media type")]
    UnsupportedMediaType,
    #[error("range not satisfiable")]
    RangeNotSatisfiable,
    #[error("expectation failed")]
    ExpectationFailed,
    #[error("misdirected request")]
    MisdirectedRequest,
    #[error("unprocessable entity")]
    UnprocessableEntity,
    #[error("locked")]
    Locked,
    #[error("failed dependency")]
    FailedDependency,
    #[error("upgrade required")]
    UpgradeRequired,
    #[error("precondition required")]
    PreconditionRequired,
    #[error("too many requests")]
    TooManyRequests,
    #[error("request header fields too large")]
    RequestHeaderFieldsTooLarge,
    #[error("unavailable for legal reasons")]
    UnavailableForLegalReasons,
    #[error("internal server error")]
    InternalServerError,
    #[error("not implemented")]
    NotImplemented,
    #[error("bad gateway")]
    BadGateway,
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("gateway timeout")]
    GatewayTimeout,
    #[error("http version not supported")]
    HttpVersionNotSupported,
    #[error("variant also negotiates")]
    VariantAlsoNegotiates,
    #[error("insufficient storage")]
    InsufficientStorage,
    #[error("loop detected")]
    LoopDetected,
    #[error("not extended")]
    NotExtended,
    #[error("network authentication required")]
    NetworkAuthenticationRequired,
    #[error("unknown status {0}")]
    Unknown(u16),
}

impl StatusError {
    /// Classify any status code.
    ///
    /// This does not decide whether `status` is acceptable; that is the
    /// validator's job. A 2xx passed here becomes `Unknown(code)`.
    pub fn classify(status: StatusCode) -> Self {
        match status.as_u16() {
            400 => StatusError::BadRequest,
            401 => StatusError::Unauthorized,
            402 => StatusError::PaymentRequired,
            403 => StatusError::Forbidden,
            404 => StatusError::NotFound,
            405 => StatusError::MethodNotAllowed,
            406 => StatusError::NotAcceptable,
            407 => StatusError::ProxyAuthenticationRequired,
            408 => StatusError::RequestTimeout,
            409 => StatusError::Conflict,
            410 => StatusError::Gone,
            411 => StatusError::LengthRequired,
            412 => StatusError::PreconditionFailed,
            413 => StatusError::PayloadTooLarge,
            414 => StatusError::UriTooLong,
            415 => StatusError::UnsupportedMediaType,
            416 => StatusError::RangeNotSatisfiable,
            417 => StatusError::ExpectationFailed,
            421 => StatusError::MisdirectedRequest,
            422 => StatusError::UnprocessableEntity,
            423 => StatusError::Locked,
            424 => StatusError::FailedDependency,
            426 => StatusError::UpgradeRequired,
            428 => StatusError::PreconditionRequired,
            429 => StatusError::TooManyRequests,
            431 => StatusError::RequestHeaderFieldsTooLarge,
            451 => StatusError::UnavailableForLegalReasons,
            500 => StatusError::InternalServerError,
            501 => StatusError::NotImplemented,
            502 => StatusError::BadGateway,
            503 => StatusError::ServiceUnavailable,
            504 => StatusError::GatewayTimeout,
            505 => StatusError::HttpVersionNotSupported,
            506 => StatusError::VariantAlsoNegotiates,
            507 => StatusError::InsufficientStorage,
            508 => StatusError::LoopDetected,
            510 => StatusError::NotExtended,
            511 => StatusError::NetworkAuthenticationRequired,
            other => StatusError::Unknown(other),
        }
    }

    /// The numeric status code this error stands for.
    pub fn code(&self) -> u16 {
        match self {
            StatusError::BadRequest => 400,
            StatusError::Unauthorized => 401,
            StatusError::PaymentRequired => 402,
            StatusError::Forbidden => 403,
            StatusError::NotFound => 404,
            StatusError::MethodNotAllowed => 405,
            StatusError::NotAcceptable => 406,
            StatusError::ProxyAuthenticationRequired => 407,
            StatusError::RequestTimeout => 408,
            StatusError::Conflict => 409,
            StatusError::Gone => 410,
            StatusError::LengthRequired => 411,
            StatusError::PreconditionFailed => 412,
            StatusError::PayloadTooLarge => 413,
            StatusError::UriTooLong => 414,
            StatusError::UnsupportedMediaType => 415,
            StatusError::RangeNotSatisfiable => 416,
            StatusError::ExpectationFailed => 417,
            StatusError::MisdirectedRequest => 421,
            StatusError::UnprocessableEntity => 422,
            StatusError::Locked => 423,
            StatusError::FailedDependency => 424,
            StatusError::UpgradeRequired => 426,
            StatusError::PreconditionRequired => 428,
            StatusError::TooManyRequests => 429,
            StatusError::RequestHeaderFieldsTooLarge => 431,
            StatusError::UnavailableForLegalReasons => 451,
            StatusError::InternalServerError => 500,
            StatusError::NotImplemented => 501,
            StatusError::BadGateway => 502,
            StatusError::ServiceUnavailable => 503,
            StatusError::GatewayTimeout => 504,
            StatusError::HttpVersionNotSupported => 505,
            StatusError::VariantAlsoNegotiates => 506,
            StatusError::InsufficientStorage => 507,
            StatusError::LoopDetected => 508,
            StatusError::NotExtended => 510,
            StatusError::NetworkAuthenticationRequired => 511,
            StatusError::Unknown(code) => *code,
        }
    }

    /// The stock set of transient failures. Retry policies start from it.
    pub const RETRYABLE_BY_DEFAULT: [StatusError; 6] = [
        StatusError::RequestTimeout,
        StatusError::InternalServerError,
        StatusError::BadGateway,
        StatusError::ServiceUnavailable,
        StatusError::GatewayTimeout,
        StatusError::InsufficientStorage,
    ];

    /// Returns whether this status is in the stock set of transient failures.
    ///
    /// The stock set is: request timeout, internal server error, bad gateway,
    /// service unavailable, gateway timeout and insufficient storage.
    /// `501 Not Implemented` is deliberately absent: asking again cannot make
    /// the server grow the feature.
    ///
    /// # Example
    ///
    /// ```
    /// use wirecall_core::StatusError;
    ///
    /// assert!(StatusError::ServiceUnavailable.is_retryable_by_default());
    /// assert!(!StatusError::NotImplemented.is_retryable_by_default());
    /// assert!(!StatusError::NotFound.is_retryable_by_default());
    /// ```
    pub fn is_retryable_by_default(&self) -> bool {
        Self::RETRYABLE_BY_DEFAULT.contains(self)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code())
    }
}

impl From<StatusError> for u16 {
    fn from(err: StatusError) -> Self {
        err.code()
    }
}

/// Error returned when parsing a [`StatusError`] from a string fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseStatusError(());

impl std::fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid status code")
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for StatusError {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = s
            .trim()
            .parse::<u16>()
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or(ParseStatusError(()))?;
        Ok(Self::classify(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_named_codes() {
        assert_eq!(StatusError::classify(StatusCode::NOT_FOUND), StatusError::NotFound);
        assert_eq!(
            StatusError::classify(StatusCode::SERVICE_UNAVAILABLE),
            StatusError::ServiceUnavailable
        );
        assert_eq!(
            StatusError::classify(StatusCode::UNAUTHORIZED),
            StatusError::Unauthorized
        );
    }

    #[test]
    fn test_classify_unmapped_code() {
        let status = StatusCode::from_u16(499).unwrap();
        assert_eq!(StatusError::classify(status), StatusError::Unknown(499));
        assert_eq!(StatusError::Unknown(499).code(), 499);
    }

    #[test]
    fn test_code_roundtrips_through_classify() {
        for code in [400u16, 401, 404, 408, 429, 500, 501, 502, 503, 504, 507, 511] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(StatusError::classify(status).code(), code);
        }
    }

    #[test]
    fn test_default_retryable_set() {
        assert!(StatusError::RequestTimeout.is_retryable_by_default());
        assert!(StatusError::InternalServerError.is_retryable_by_default());
        assert!(StatusError::BadGateway.is_retryable_by_default());
        assert!(StatusError::GatewayTimeout.is_retryable_by_default());
        assert!(StatusError::InsufficientStorage.is_retryable_by_default());

        assert!(!StatusError::NotImplemented.is_retryable_by_default());
        assert!(!StatusError::Unauthorized.is_retryable_by_default());
        assert!(!StatusError::TooManyRequests.is_retryable_by_default());
        assert!(!StatusError::Unknown(599).is_retryable_by_default());
    }

    #[test]
    fn test_family() {
        assert!(StatusError::Conflict.is_client_error());
        assert!(!StatusError::Conflict.is_server_error());
        assert!(StatusError::LoopDetected.is_server_error());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("404".parse(), Ok(StatusError::NotFound));
        assert_eq!("nope".parse::<StatusError>(), Err(ParseStatusError(())));
    }
}
