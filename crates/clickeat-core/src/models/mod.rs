pub mod menu;
pub mod staff;

pub use menu::{Category, CategoryForm, Dish, DishForm, DishIngredient, Photo};
pub use staff::{NewStaffMember, Profile, ProfileUpdate, Role, StaffMember, StaffUpdate};
