//! Advisory, best-effort notification rows (spec §4.5.3, §6.6 `notifications`
//! table). Distinct from [`crate::event::Event`]: notifications are a side
//! channel for operator-facing alerts (core/peripheral violation pushes) and are
//! never claimed or dispatched by the Event Queue/Dispatcher pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CoreViolation,
    PeripheralViolation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub memory_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
