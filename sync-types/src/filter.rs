//! Server-side sync filter.

use serde::{Deserialize, Serialize};

use crate::TypesError;

/// Default number of timeline events returned per room per sync.
pub const DEFAULT_TIMELINE_LIMIT: u32 = 50;

/// Filter uploaded to the remote service before the first sync.
///
/// Only the timeline limit is recognized; it serializes as
/// `{"room":{"timeline":{"limit":50}}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Filter {
    /// Room section of the filter.
    #[serde(default)]
    pub room: RoomFilter,
}

/// Room section of a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomFilter {
    /// Timeline section.
    #[serde(default)]
    pub timeline: TimelineFilter,
}

/// Timeline section of a [`RoomFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineFilter {
    /// Maximum timeline events per room per sync.
    pub limit: u32,
}

impl Default for TimelineFilter {
    fn default() -> Self {
        Self {
            limit: DEFAULT_TIMELINE_LIMIT,
        }
    }
}

impl Filter {
    /// Create a filter with the given timeline limit.
    pub fn with_timeline_limit(limit: u32) -> Self {
        Self {
            room: RoomFilter {
                timeline: TimelineFilter { limit },
            },
        }
    }

    /// The configured timeline limit.
    pub fn timeline_limit(&self) -> u32 {
        self.room.timeline.limit
    }

    /// Encode as the JSON body sent to the remote service.
    pub fn to_json(&self) -> Result<String, TypesError> {
        serde_json::to_string(self).map_err(TypesError::Serialization)
    }
}
