use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row from the `drivers` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_available: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Driver {
    /// Eligible to receive assignments right now.
    pub fn can_take_orders(&self) -> bool {
        self.is_approved && self.is_active && self.is_available
    }
}
