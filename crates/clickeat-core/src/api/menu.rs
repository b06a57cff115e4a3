//! Category and dish endpoints.

use serde_json::json;

use super::client::{Action, ApiClient};
use super::ApiError;
use crate::events::Resource;
use crate::models::{Category, CategoryForm, Dish, DishForm};

impl ApiClient {
    // ========================================================================
    // Categories
    // ========================================================================

    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let result = self.get("categories/").await;
        self.report(result, Resource::Categories, Action::Load)
    }

    pub async fn get_category(&self, id: u64) -> Result<Category, ApiError> {
        let result = self.get(&format!("categories/{}/", id)).await;
        self.report(result, Resource::Categories, Action::Load)
    }

    pub async fn create_category(&self, form: &CategoryForm) -> Result<Category, ApiError> {
        let result = self.post("categories/", form).await;
        self.report(result, Resource::Categories, Action::Save)
    }

    pub async fn update_category(&self, id: u64, form: &CategoryForm) -> Result<Category, ApiError> {
        let result = self.patch(&format!("categories/{}/", id), form).await;
        self.report(result, Resource::Categories, Action::Save)
    }

    pub async fn delete_category(&self, id: u64) -> Result<(), ApiError> {
        let result = self.delete(&format!("categories/{}/", id)).await;
        self.report(result, Resource::Categories, Action::Delete)
    }

    // ========================================================================
    // Dishes
    // ========================================================================

    /// All dishes, or only those in `category_id`.
    pub async fn list_dishes(&self, category_id: Option<u64>) -> Result<Vec<Dish>, ApiError> {
        let result = match category_id {
            Some(id) => {
                let id = id.to_string();
                self.get_with_query("dishes/", &[("category_id", id.as_str())])
                    .await
            }
            None => self.get("dishes/").await,
        };
        self.report(result, Resource::Dishes, Action::Load)
    }

    pub async fn get_dish(&self, id: u64) -> Result<Dish, ApiError> {
        let result = self.get(&format!("dishes/{}/", id)).await;
        self.report(result, Resource::Dishes, Action::Load)
    }

    pub async fn create_dish(&self, form: DishForm) -> Result<Dish, ApiError> {
        let result = self.post_multipart("dishes/", form.into_parts()).await;
        self.report(result, Resource::Dishes, Action::Save)
    }

    pub async fn update_dish(&self, id: u64, form: DishForm) -> Result<Dish, ApiError> {
        let result = self
            .patch_multipart(&format!("dishes/{}/", id), form.into_parts())
            .await;
        self.report(result, Resource::Dishes, Action::Save)
    }

    /// Toggle availability without re-sending the rest of the dish.
    pub async fn set_dish_availability(&self, id: u64, available: bool) -> Result<Dish, ApiError> {
        let result = self
            .patch(&format!("dishes/{}/", id), &json!({ "is_available": available }))
            .await;
        self.report(result, Resource::Dishes, Action::Save)
    }

    pub async fn delete_dish(&self, id: u64) -> Result<(), ApiError> {
        let result = self.delete(&format!("dishes/{}/", id)).await;
        self.report(result, Resource::Dishes, Action::Delete)
    }
}
