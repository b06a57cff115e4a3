use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::api::FormPart;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Category {
    pub id: u64,
    pub name: String,
    /// Derived from the name by the backend; read-only.
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CategoryForm {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DishIngredient {
    pub ingredient_id: u64,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_base_ingredient: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Dish {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Decimal string, e.g. "12.50"
    pub price: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    pub category: Category,
    #[serde(default)]
    pub ingredients: Vec<DishIngredient>,
}

impl Dish {
    /// Price with two decimals, or the raw string if it does not parse.
    pub fn price_display(&self) -> String {
        match self.price.parse::<f64>() {
            Ok(value) => format!("{:.2}", value),
            Err(_) => self.price.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Image attached to a dish form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl Photo {
    /// Read an image from disk, guessing its mime type from the extension.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());
        Ok(Self {
            mime: mime_for(path).map(str::to_string),
            file_name,
            bytes,
        })
    }
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Create/update payload for a dish, sent as multipart so a photo can ride
/// along.
#[derive(Debug, Clone, PartialEq)]
pub struct DishForm {
    pub name: String,
    pub description: String,
    pub price: String,
    pub is_available: bool,
    pub category_id: u64,
    pub photo: Option<Photo>,
}

impl DishForm {
    pub fn into_parts(self) -> Vec<FormPart> {
        let mut parts = vec![
            FormPart::text("name", self.name),
            FormPart::text("description", self.description),
            FormPart::text("price", self.price),
            FormPart::text("is_available", self.is_available.to_string()),
            FormPart::text("category_id", self.category_id.to_string()),
        ];
        if let Some(photo) = self.photo {
            parts.push(FormPart::File {
                name: "photo".to_string(),
                file_name: photo.file_name,
                mime: photo.mime,
                bytes: photo.bytes,
            });
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dish_parses_backend_payload() {
        let dish: Dish = serde_json::from_value(json!({
            "id": 12,
            "name": "Margherita",
            "description": "Tomato, mozzarella, basil",
            "price": "24.00",
            "photo_url": null,
            "is_available": false,
            "category": {"id": 3, "name": "Pizza", "slug": "pizza"},
            "ingredients": [
                {"ingredient_id": 1, "name": "Mozzarella", "is_base_ingredient": true}
            ]
        }))
        .unwrap();

        assert_eq!(dish.category.slug, "pizza");
        assert!(!dish.is_available);
        assert_eq!(dish.ingredients.len(), 1);
        assert_eq!(dish.price_display(), "24.00");
    }

    #[test]
    fn test_dish_defaults() {
        let dish: Dish = serde_json::from_value(json!({
            "id": 1,
            "name": "Soup",
            "price": "9.5",
            "category": {"id": 2, "name": "Starters"}
        }))
        .unwrap();
        assert!(dish.is_available);
        assert!(dish.ingredients.is_empty());
        assert_eq!(dish.photo_url, None);
        assert_eq!(dish.price_display(), "9.50");
    }

    #[test]
    fn test_dish_form_parts() {
        let form = DishForm {
            name: "Margherita".into(),
            description: String::new(),
            price: "24.00".into(),
            is_available: true,
            category_id: 3,
            photo: Some(Photo {
                file_name: "pizza.jpg".into(),
                mime: Some("image/jpeg".into()),
                bytes: vec![1, 2, 3],
            }),
        };
        let parts = form.into_parts();
        let names: Vec<&str> = parts.iter().map(FormPart::name).collect();
        assert_eq!(
            names,
            vec!["name", "description", "price", "is_available", "category_id", "photo"]
        );
        assert_eq!(parts[3], FormPart::text("is_available", "true"));
    }

    #[test]
    fn test_photo_load_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dish.PNG");
        std::fs::write(&path, [0x89, 0x50]).unwrap();

        let photo = Photo::load(&path).unwrap();
        assert_eq!(photo.file_name, "Dish.PNG");
        assert_eq!(photo.mime.as_deref(), Some("image/png"));
        assert_eq!(photo.bytes, vec![0x89, 0x50]);
        assert_eq!(mime_for(Path::new("notes.txt")), None);
    }
}
