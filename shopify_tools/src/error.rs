use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopifyApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid GraphQL query: {0}")]
    InvalidGraphQL(String),
    #[error("GraphQL query failed: {0}")]
    GraphQLError(String),
    #[error("Mutation was rejected: {0}")]
    UserErrors(String),
    #[error("The response contained no data")]
    EmptyResponse,
    #[error("The response was missing a required field: {0}")]
    MissingField(&'static str),
}

impl ShopifyApiError {
    /// True for failures that may succeed if the same request is simply sent again later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RestResponseError(_) => true,
            Self::QueryError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
