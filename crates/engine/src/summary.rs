//! Project summaries for the combine screen, the history list and the
//! dashboard. All three go through [`summarize`] with the same inputs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::try_join_all;
use montage_core::combine_job::CombineJob;
use montage_core::store::{ProjectRecord, SegmentSource};
use montage_core::summary::{
    is_dashboard_active, sort_by_recency, summarize, ProjectSummary, SummaryContext,
};
use montage_core::types::{DbId, Timestamp};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::orchestrator::CombineOrchestrator;

/// A project summary plus the project name and its combine job, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectOverview {
    pub name: String,
    #[serde(flatten)]
    pub summary: ProjectSummary,
    /// Current or most recent combine job.
    pub combine: Option<CombineJob>,
}

impl AsRef<ProjectSummary> for ProjectOverview {
    fn as_ref(&self) -> &ProjectSummary {
        &self.summary
    }
}

pub struct SummaryService {
    source: Arc<dyn SegmentSource>,
    combines: Arc<CombineOrchestrator>,
    stall_threshold: Duration,
    active_listing_window: Duration,
}

impl SummaryService {
    pub fn new(
        source: Arc<dyn SegmentSource>,
        combines: Arc<CombineOrchestrator>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            source,
            combines,
            stall_threshold: config.stall_threshold,
            active_listing_window: config.active_listing_window,
        }
    }

    /// Summarize one project as of now.
    pub async fn project_summary(&self, project_id: DbId) -> Result<ProjectOverview, EngineError> {
        let project = self
            .source
            .find_project(project_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "project",
                id: project_id,
            })?;
        self.overview(project, Utc::now()).await
    }

    /// Every project of an owner, most recently updated first.
    pub async fn history(&self, owner_id: DbId) -> Result<Vec<ProjectOverview>, EngineError> {
        self.listing(owner_id, Utc::now()).await
    }

    /// The owner's dashboard "active jobs".
    pub async fn active(&self, owner_id: DbId) -> Result<Vec<ProjectOverview>, EngineError> {
        let now = Utc::now();
        let mut listing = self.listing(owner_id, now).await?;
        listing.retain(|o| is_dashboard_active(&o.summary, now, self.active_listing_window));
        Ok(listing)
    }

    // ---- private helpers ----

    async fn listing(&self, owner_id: DbId, now: Timestamp) -> Result<Vec<ProjectOverview>, EngineError> {
        let projects = self.source.projects_for_owner(owner_id).await?;
        let mut overviews =
            try_join_all(projects.into_iter().map(|project| self.overview(project, now))).await?;
        sort_by_recency(&mut overviews);
        Ok(overviews)
    }

    async fn overview(&self, project: ProjectRecord, now: Timestamp) -> Result<ProjectOverview, EngineError> {
        let segments = self.source.segments_for_project(project.id).await?;
        let combine = self.combines.job(project.id).await;
        let combine_in_flight = self.combines.is_in_flight(project.id).await;

        let summary = summarize(
            project.id,
            &segments,
            SummaryContext {
                final_artifact_url: project.final_artifact_url.as_deref(),
                combine_in_flight,
                now,
                stall_threshold: self.stall_threshold,
            },
        );
        Ok(ProjectOverview {
            name: project.name,
            summary,
            combine,
        })
    }
}
