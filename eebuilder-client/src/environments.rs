//! Environment API endpoints

use crate::BuilderClient;
use crate::error::Result;
use eebuilder_core::domain::environment::Environment;
use eebuilder_core::dto::environment::EnvironmentList;

impl BuilderClient {
    /// List environments known to the orchestrator, sorted by name
    pub async fn list_environments(&self) -> Result<Vec<Environment>> {
        let url = format!("{}/api/environments", self.base_url);
        let response = self.client.get(&url).send().await?;

        let list: EnvironmentList = self.handle_response(response).await?;
        Ok(list.environments)
    }
}
