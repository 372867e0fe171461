//! Data types for wallbox status responses

use serde::{Deserialize, Serialize};

/// API mode → display mode
const WALLBOX_MODE_MAP: [(&str, &str); 3] = [("eco", "Eco"), ("fast", "Full"), ("solar", "Solar")];

/// Raw `GET /status` reply
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub status: String,
}

/// Wallbox status exposed to consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WallboxStatus {
    pub mode: String,
    pub status: String,
}

impl WallboxStatus {
    pub fn from_response(response: StatusResponse) -> Self {
        Self {
            mode: display_mode(&response.mode),
            status: response.status,
        }
    }
}

/// Display label for an API mode; unknown modes pass through.
pub fn display_mode(mode: &str) -> String {
    WALLBOX_MODE_MAP
        .iter()
        .find(|(api, _)| api.eq_ignore_ascii_case(mode))
        .map(|(_, display)| display.to_string())
        .unwrap_or_else(|| mode.to_string())
}
