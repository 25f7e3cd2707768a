use std::fmt::Display;

use chrono::{DateTime, Utc};
use credit_engine::{
    credit_objects::{CreditReport, CreditRequest},
    db_types::{GameRecord, Prediction},
};
use serde::{Deserialize, Serialize};

use crate::{errors::ServerError, helpers::normalize_shop};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//----------------------------------------------   Active game  --------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct ActiveGameQuery {
    pub shop: Option<String>,
}

/// `{"active": false}`, or `{"active": true, "id": ..., "name": ..., "startAt": ..., "endAt": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct ActiveGameResponse {
    pub active: bool,
    #[serde(flatten)]
    pub game: Option<ActiveGameDetails>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGameDetails {
    pub id: String,
    pub name: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

impl From<Option<GameRecord>> for ActiveGameResponse {
    fn from(game: Option<GameRecord>) -> Self {
        match game {
            Some(g) => Self {
                active: true,
                game: Some(ActiveGameDetails { id: g.id, name: g.name, start_at: g.start_at, end_at: g.end_at }),
            },
            None => Self { active: false, game: None },
        }
    }
}

//----------------------------------------------   Admin  --------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PredictionUpload {
    One(Prediction),
    Many(Vec<Prediction>),
}

impl PredictionUpload {
    pub fn into_vec(self) -> Vec<Prediction> {
        match self {
            Self::One(p) => vec![p],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneResult {
    pub removed: u64,
}

/// Reads a credit request from a raw body. Empty or unreadable bodies, and requests without a shop, are rejected with
/// a single itemized failure.
pub fn parse_credit_request(body: &[u8]) -> Result<CreditRequest, ServerError> {
    let reject = |reason: String| ServerError::CreditRequestRejected(CreditReport::rejected("", &reason));
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(reject("Empty request body".to_string()));
    }
    let mut request = serde_json::from_slice::<CreditRequest>(body)
        .map_err(|e| reject(format!("Malformed credit request. {e}")))?;
    let shop_id = match &mut request {
        CreditRequest::Manual(m) => &mut m.shop_id,
        CreditRequest::Winners(w) => &mut w.shop_id,
    };
    *shop_id = normalize_shop(shop_id);
    if shop_id.is_empty() {
        return Err(reject("Missing shopId".to_string()));
    }
    Ok(request)
}
