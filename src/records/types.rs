use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::comments;

/// A camera placement: where a camera stood and how it was set up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// May be blank in the source files; blank deployments never join.
    pub deployment_id: Option<String>,
    pub location_id: String,
    pub location_name: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub coordinate_uncertainty: Option<i32>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub setup_by: String,
    pub camera_id: String,
    pub camera_model: String,
    pub camera_interval: Option<i32>,
    /// Doubles as the location elevation.
    pub camera_height: Option<f64>,
    pub camera_tilt: Option<f64>,
    pub camera_heading: Option<i32>,
    pub timestamp_issues: bool,
    pub bait_use: String,
    pub session: String,
    pub array: String,
    pub feature_type: String,
    pub habitat: String,
    pub tags: String,
    pub notes: String,
}

/// One photograph (or other media file) belonging to a deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub media_id: String,
    pub deployment_id: Option<String>,
    pub sequence_id: String,
    pub capture_method: String,
    pub timestamp: Option<NaiveDateTime>,
    /// Storage path of the file, relative to its collection's bucket.
    pub file_path: String,
    pub file_name: String,
    pub file_media_type: String,
    pub exif_data: String,
    pub favorite: bool,
    pub comments: String,
}

/// A species sighting on a media item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub observation_id: Option<String>,
    pub deployment_id: Option<String>,
    pub sequence_id: String,
    pub media_id: String,
    pub timestamp: Option<NaiveDateTime>,
    pub observation_type: String,
    pub camera_setup: bool,
    pub taxon_id: String,
    pub scientific_name: String,
    pub count: Option<i32>,
    pub count_new: Option<i32>,
    pub life_stage: String,
    pub sex: String,
    pub behaviour: String,
    pub individual_id: String,
    pub classification_method: String,
    pub classified_by: String,
    pub classification_timestamp: Option<NaiveDateTime>,
    pub classification_confidence: Option<f64>,
    /// Free text; may carry a `[COMMONNAME:...]` tag. Never rewritten on load/save.
    pub comments: String,
}

impl Observation {
    /// The common name carried in the comments tag, if any.
    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        comments::common_name(&self.comments)
    }
}
