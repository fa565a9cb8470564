//! Obstacle domain model.
//!
//! # Responsibility
//! - Define the canonical obstacle record and its durable JSON shape.
//! - Provide the transient draft used by add/edit dialogs.
//!
//! # Invariants
//! - `id` is unique within one obstacle collection.
//! - `photos` keeps attachment order and may contain duplicates.
//! - `location`, when set, holds finite in-range coordinates.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Integer identifier assigned by the store on creation.
pub type ObstacleId = i64;

/// Geographic coordinate pair attached to an obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A single user-reported obstacle.
///
/// Serialized field names match the `@obstacles` payload written by earlier
/// app versions, so existing on-device data keeps loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub title: String,
    pub description: String,
    /// Missing in older payloads; read as empty.
    #[serde(default)]
    pub photos: Vec<String>,
    /// Forward-compatible; no flow populates it yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Obstacle {
    /// Creates a record with no photos and no location.
    pub fn new(id: ObstacleId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            photos: Vec::new(),
            location: None,
        }
    }

    /// Builds a record from a committed draft.
    pub fn from_draft(id: ObstacleId, draft: &ObstacleDraft) -> Self {
        Self::new(id, draft.title.clone(), draft.description.clone())
    }

    /// Overwrites the editable text fields only.
    pub fn apply_draft(&mut self, draft: &ObstacleDraft) {
        self.title.clone_from(&draft.title);
        self.description.clone_from(&draft.description);
    }

    /// Returns a draft pre-filled with this record's text fields.
    pub fn to_draft(&self) -> ObstacleDraft {
        ObstacleDraft {
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }

    /// Validates record-level invariants.
    ///
    /// Titles and descriptions are free text and may be empty; only the
    /// optional location is constrained.
    pub fn validate(&self) -> Result<(), ObstacleValidationError> {
        let Some(location) = self.location else {
            return Ok(());
        };

        if !location.latitude.is_finite() || !(-90.0..=90.0).contains(&location.latitude) {
            return Err(ObstacleValidationError::LatitudeOutOfRange {
                id: self.id,
                latitude: location.latitude,
            });
        }
        if !location.longitude.is_finite() || !(-180.0..=180.0).contains(&location.longitude) {
            return Err(ObstacleValidationError::LongitudeOutOfRange {
                id: self.id,
                longitude: location.longitude,
            });
        }

        Ok(())
    }
}

/// Transient editable fields held while an add/edit dialog is open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObstacleDraft {
    pub title: String,
    pub description: String,
}

impl ObstacleDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Record validation failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ObstacleValidationError {
    LatitudeOutOfRange { id: ObstacleId, latitude: f64 },
    LongitudeOutOfRange { id: ObstacleId, longitude: f64 },
}

impl Display for ObstacleValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LatitudeOutOfRange { id, latitude } => {
                write!(f, "obstacle {id}: latitude {latitude} is outside [-90, 90]")
            }
            Self::LongitudeOutOfRange { id, longitude } => {
                write!(
                    f,
                    "obstacle {id}: longitude {longitude} is outside [-180, 180]"
                )
            }
        }
    }
}

impl Error for ObstacleValidationError {}

/// Checks collection-level invariants: every record is valid and ids are unique.
pub fn validate_collection(obstacles: &[Obstacle]) -> Result<(), CollectionValidationError> {
    let mut seen = std::collections::BTreeSet::new();
    for obstacle in obstacles {
        obstacle.validate()?;
        if !seen.insert(obstacle.id) {
            return Err(CollectionValidationError::DuplicateId(obstacle.id));
        }
    }
    Ok(())
}

/// Collection validation failures.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionValidationError {
    Record(ObstacleValidationError),
    DuplicateId(ObstacleId),
}

impl Display for CollectionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record(err) => write!(f, "{err}"),
            Self::DuplicateId(id) => write!(f, "duplicate obstacle id {id}"),
        }
    }
}

impl Error for CollectionValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Record(err) => Some(err),
            Self::DuplicateId(_) => None,
        }
    }
}

impl From<ObstacleValidationError> for CollectionValidationError {
    fn from(value: ObstacleValidationError) -> Self {
        Self::Record(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_collection, CollectionValidationError, Location, Obstacle};

    #[test]
    fn validate_accepts_missing_location() {
        assert!(Obstacle::new(1, "", "").validate().is_ok());
    }

    #[test]
    fn validate_rejects_nan_latitude() {
        let mut obstacle = Obstacle::new(1, "a", "b");
        obstacle.location = Some(Location::new(f64::NAN, 2.0));
        assert!(obstacle.validate().is_err());
    }

    #[test]
    fn validate_collection_reports_duplicate_ids() {
        let items = vec![Obstacle::new(3, "a", ""), Obstacle::new(3, "b", "")];
        assert_eq!(
            validate_collection(&items),
            Err(CollectionValidationError::DuplicateId(3))
        );
    }
}
