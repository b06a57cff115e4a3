//! Staff account management. Manager-only on the backend; other roles get
//! `ApiError::AccessDenied`.

use super::client::{Action, ApiClient};
use super::ApiError;
use crate::events::Resource;
use crate::models::{NewStaffMember, StaffMember, StaffUpdate};

impl ApiClient {
    pub async fn list_staff(&self) -> Result<Vec<StaffMember>, ApiError> {
        let result = self.get("users/staff/").await;
        self.report(result, Resource::Staff, Action::Load)
    }

    pub async fn create_staff(&self, member: &NewStaffMember) -> Result<StaffMember, ApiError> {
        let result = self.post("users/staff/", member).await;
        self.report(result, Resource::Staff, Action::Save)
    }

    pub async fn update_staff(&self, id: u64, update: &StaffUpdate) -> Result<StaffMember, ApiError> {
        let result = self.patch(&format!("users/staff/{}/", id), update).await;
        self.report(result, Resource::Staff, Action::Save)
    }

    pub async fn delete_staff(&self, id: u64) -> Result<(), ApiError> {
        let result = self.delete(&format!("users/staff/{}/", id)).await;
        self.report(result, Resource::Staff, Action::Delete)
    }
}
