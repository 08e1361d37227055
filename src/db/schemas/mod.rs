//! Database schemas for OpenCafe
//!
//! Field names are camelCase on the wire and in MongoDB.

mod admin;
mod card;
mod customer;
mod dish;
mod instance;
mod issue;
mod menu;
mod metadata;
mod point;
mod string;

pub use admin::{AdminDoc, ADMIN_COLLECTION, UNBOUND};
pub use card::{card_hash, CardDoc, CARD_COLLECTION};
pub use customer::{CustomerDoc, CUSTOMER_COLLECTION};
pub use dish::{DishDoc, NutriProfile, DISH_COLLECTION, NUTRITION_KEYS};
pub use instance::{InstanceDoc, INSTANCE_COLLECTION};
pub use issue::{IssueDoc, ISSUE_COLLECTION};
pub use menu::{MenuDoc, MENU_COLLECTION};
pub use metadata::Metadata;
pub use point::{PointDoc, POINT_COLLECTION};
pub use string::{LocalizedStringDoc, STRING_COLLECTION};
