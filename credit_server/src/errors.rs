use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use credit_engine::{
    credit_objects::CreditReport,
    CreditApiError,
    IngestError,
    StorageError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Missing or invalid request header: {0}")]
    InvalidRequestHeader(String),
    #[error("Missing or invalid query parameter: {0}")]
    InvalidQuery(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(String),
    #[error("Shop not onboarded/active: {0}")]
    TenantInactive(String),
    #[error("The store is unavailable. {0}")]
    UpstreamError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    /// A credit request that was rejected as a whole. The body is the itemized report rather than the usual error
    /// object.
    #[error("Invalid credit request: {}", .0.failures.first().map(|f| f.error.as_str()).unwrap_or_default())]
    CreditRequestRejected(CreditReport),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestHeader(_) => StatusCode::BAD_REQUEST,
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::CreditRequestRejected(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::TenantInactive(_) => StatusCode::CONFLICT,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        response.insert_header(ContentType::json());
        match self {
            Self::CreditRequestRejected(report) => response.json(report),
            _ => response.body(serde_json::json!({ "error": self.to_string() }).to_string()),
        }
    }
}

impl From<StorageError> for ServerError {
    fn from(e: StorageError) -> Self {
        Self::BackendError(e.to_string())
    }
}

/// The webhook handler acknowledges identity and payload errors rather than returning them, so the 400s here only
/// surface if another caller propagates them.
impl From<IngestError> for ServerError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::TenantInactive(shop) => Self::TenantInactive(shop),
            IngestError::InvalidPayload(s) => Self::InvalidRequestBody(s),
            IngestError::Identity(e) => Self::InvalidRequestBody(e.to_string()),
            IngestError::StorageError(e) => Self::BackendError(e.to_string()),
            IngestError::Upstream(e) => Self::UpstreamError(e.to_string()),
        }
    }
}

impl From<CreditApiError> for ServerError {
    fn from(e: CreditApiError) -> Self {
        match e {
            CreditApiError::InvalidRequest(reason) => Self::CreditRequestRejected(CreditReport::rejected("", &reason)),
            CreditApiError::StorageError(e) => Self::BackendError(e.to_string()),
        }
    }
}
