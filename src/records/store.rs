use std::collections::HashMap;

use super::types::{Deployment, Media, Observation};

/// The synchronized records of one collection, held read-only while queried.
///
/// Join lookups are built once on construction. Every lookup keeps file
/// order, so "first matching observation" means the first row in the
/// observations file.
#[derive(Debug, Clone, Default)]
pub struct CollectionRecords {
    bucket: String,
    deployments: Vec<Deployment>,
    media: Vec<Media>,
    observations: Vec<Observation>,
    observations_by_media: HashMap<String, Vec<usize>>,
    deployment_by_id: HashMap<String, usize>,
}

impl CollectionRecords {
    /// `bucket` qualifies every result path produced from this collection.
    pub fn new(
        bucket: impl Into<String>,
        deployments: Vec<Deployment>,
        media: Vec<Media>,
        observations: Vec<Observation>,
    ) -> Self {
        let bucket = bucket.into();
        let mut observations_by_media: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, obs) in observations.iter().enumerate() {
            observations_by_media.entry(obs.media_id.clone()).or_default().push(i);
        }
        let mut deployment_by_id = HashMap::new();
        for (i, dep) in deployments.iter().enumerate() {
            let Some(id) = dep.deployment_id.as_ref() else { continue };
            if deployment_by_id.contains_key(id) {
                log::warn!("collection {bucket}: duplicate deployment id '{id}', keeping the first");
                continue;
            }
            deployment_by_id.insert(id.clone(), i);
        }
        Self { bucket, deployments, media, observations, observations_by_media, deployment_by_id }
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[must_use]
    pub fn deployments(&self) -> &[Deployment] {
        &self.deployments
    }

    #[must_use]
    pub fn media(&self) -> &[Media] {
        &self.media
    }

    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// All observations of `media`, in file order.
    pub fn observations_for<'a>(&'a self, media: &Media) -> impl Iterator<Item = &'a Observation> + use<'a> {
        self.observations_by_media
            .get(&media.media_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.observations[i])
    }

    /// The first observation of `media`. Later observations are never consulted.
    #[must_use]
    pub fn first_observation(&self, media: &Media) -> Option<&Observation> {
        self.observations_for(media).next()
    }

    #[must_use]
    pub fn deployment(&self, deployment_id: &str) -> Option<&Deployment> {
        self.deployment_by_id.get(deployment_id).map(|&i| &self.deployments[i])
    }

    /// Media → observation → deployment: the deployment of the first
    /// observation of `media` whose deployment id resolves.
    #[must_use]
    pub fn deployment_for(&self, media: &Media) -> Option<&Deployment> {
        self.observations_for(media)
            .find_map(|obs| obs.deployment_id.as_deref().and_then(|id| self.deployment(id)))
    }
}
