//! Dish document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::schemas::Metadata;
use crate::db::store::{IntoIndexes, MutMetadata};

/// Collection name for dishes
pub const DISH_COLLECTION: &str = "dishes";

/// Keys of the nutrition profile, in storage order
pub const NUTRITION_KEYS: [&str; 5] = ["weight", "calories", "proteins", "fats", "carbohydrates"];

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct NutriProfile {
    pub weight: i32,
    pub calories: i32,
    pub proteins: i32,
    pub fats: i32,
    pub carbohydrates: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DishDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub dish_id: i32,

    pub price: i32,

    #[serde(default)]
    pub is_on_sale: bool,

    /// Price before the current sale
    #[serde(default)]
    pub old_price: i32,

    pub name_si: String,
    pub description_si: String,

    #[serde(default)]
    pub nutri_profile: NutriProfile,

    /// Image ids (ObjectId hex)
    #[serde(default)]
    pub images: Vec<String>,
}

impl IntoIndexes for DishDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "dishId": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("dish_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for DishDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
