use super::client::{Action, ApiClient};
use super::ApiError;
use crate::events::Resource;
use crate::models::{Profile, ProfileUpdate};

impl ApiClient {
    /// The signed-in user's own account.
    pub async fn me(&self) -> Result<Profile, ApiError> {
        let result = self.get("auth/me/").await;
        self.report(result, Resource::Profile, Action::Load)
    }

    pub async fn update_me(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        let result = self.patch("auth/me/", update).await;
        self.report(result, Resource::Profile, Action::Save)
    }
}
