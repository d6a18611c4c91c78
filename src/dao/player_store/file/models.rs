use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::dao::models::PlayerEntity;

/// Format version written by this build.
pub const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout of the player file: one document holding every record in listing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDocument {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
    pub players: Vec<PlayerEntity>,
}

impl PlayerDocument {
    pub fn from_entities(players: Vec<PlayerEntity>) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            saved_at: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
            players,
        }
    }
}
