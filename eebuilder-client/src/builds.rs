//! Build-related API endpoints

use crate::BuilderClient;
use crate::error::Result;
use eebuilder_core::domain::build::{BuildJob, BuildListItem};
use eebuilder_core::dto::build::{BuildList, BuildRequest, BuildResponse, CancelResponse};
use uuid::Uuid;

impl BuilderClient {
    /// Submit a build
    ///
    /// Returns as soon as the orchestrator has accepted the request; the
    /// build itself runs in the background.
    pub async fn submit_build(&self, req: &BuildRequest) -> Result<BuildResponse> {
        let url = format!("{}/api/builds", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Get a build by ID, including the logs captured so far
    pub async fn get_build(&self, build_id: Uuid) -> Result<BuildJob> {
        let url = format!("{}/api/builds/{}", self.base_url, build_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List builds, most recent first
    pub async fn list_builds(&self) -> Result<Vec<BuildListItem>> {
        let url = format!("{}/api/builds", self.base_url);
        let response = self.client.get(&url).send().await?;

        let list: BuildList = self.handle_response(response).await?;
        Ok(list.builds)
    }

    /// Request cancellation of a build
    ///
    /// Cancelling a finished build succeeds and reports its final status.
    pub async fn cancel_build(&self, build_id: Uuid) -> Result<CancelResponse> {
        let url = format!("{}/api/builds/{}/cancel", self.base_url, build_id);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }
}
