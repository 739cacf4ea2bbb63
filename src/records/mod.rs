//! Read-only record store: the Camtrap deployments, media and observations of
//! each synchronized collection.
pub mod comments;
mod camtrap;
mod options;
mod store;
mod types;

pub use camtrap::{
    DEPLOYMENTS_FILE, MEDIA_FILE, OBSERVATIONS_FILE, load_collection_dir, parse_timestamp,
    read_deployments, read_media, read_observations, save_collection_dir, write_deployments,
    write_media, write_observations,
};
pub use options::{CsvOptions, LoadReport};
pub use store::CollectionRecords;
pub use types::{Deployment, Media, Observation};
