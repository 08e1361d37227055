//! Dishes in the catalogue
//!
//! Names and descriptions are localized strings under the instance's
//! primary culture, so a dish can only be created once the instance is set
//! up.

use bson::{doc, oid::ObjectId, Document};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::auth::Role;
use crate::db::{AdminDoc, DishDoc, Metadata, NutriProfile, NUTRITION_KEYS};
use crate::services::strings::{self, gen_si, SiField, SiTarget};
use crate::services::{instance, missing_id, require, require_id, unique_id, Context};
use crate::types::{CafeError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDishRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: i32,
    #[serde(default)]
    pub nutri_profile: BTreeMap<String, i32>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDishRequest {
    #[serde(default = "missing_id")]
    pub did: i32,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub updates: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishTokenRequest {
    #[serde(default = "missing_id")]
    pub did: i32,
    #[serde(default)]
    pub token: String,
}

/// Resolve a caller allowed to edit dishes and menus: a general or a head.
pub(crate) async fn require_catalogue_editor(ctx: &Context, token: &str) -> Result<AdminDoc> {
    require(token, "token")?;
    let caller = ctx.auth.require_admin(token).await?;
    if caller.has_role(Role::General) || ctx.auth.is_head(&caller) {
        Ok(caller)
    } else {
        Err(CafeError::Unauthorized("Not allowed to edit the catalogue".into()))
    }
}

/// The primary culture of the live instance
pub(crate) async fn primary_culture(ctx: &Context) -> Result<String> {
    let live = instance::live(ctx)
        .await?
        .ok_or_else(|| CafeError::Conflict("Ask the head admin to set up the instance first".into()))?;
    live.primary_culture()
        .map(str::to_string)
        .ok_or_else(|| CafeError::Conflict("The instance has no cultures".into()))
}

pub(crate) fn parse_image(value: &str) -> Result<String> {
    ObjectId::parse_str(value.trim())
        .map(|oid| oid.to_hex())
        .map_err(|_| CafeError::InvalidArgument(format!("'{value}' is not a valid image id")))
}

fn nutri_profile(values: &BTreeMap<String, i32>) -> Result<NutriProfile> {
    let get = |key: &str| {
        values
            .get(key)
            .copied()
            .ok_or_else(|| CafeError::InvalidArgument(format!("'nutriProfile.{key}' is required")))
    };
    Ok(NutriProfile {
        weight: get("weight")?,
        calories: get("calories")?,
        proteins: get("proteins")?,
        fats: get("fats")?,
        carbohydrates: get("carbohydrates")?,
    })
}

async fn load(ctx: &Context, did: i32) -> Result<DishDoc> {
    ctx.stores
        .dishes
        .find_one(doc! { "dishId": did })
        .await?
        .ok_or_else(|| CafeError::NotFound(format!("Dish {did} not found")))
}

/// Create a dish along with its name and description strings.
pub async fn new_dish(ctx: &Context, req: NewDishRequest) -> Result<DishDoc> {
    require(&req.name, "name")?;
    require(&req.description, "description")?;
    if req.price < 0 {
        return Err(CafeError::InvalidArgument("'price' cannot be negative".into()));
    }
    let profile = nutri_profile(&req.nutri_profile)?;
    let images = req
        .images
        .iter()
        .map(|i| parse_image(i))
        .collect::<Result<Vec<_>>>()?;

    let caller = require_catalogue_editor(ctx, &req.token).await?;
    let culture = primary_culture(ctx).await?;

    let dishes = ctx.stores.dishes.clone();
    let dish_id = unique_id(|candidate| {
        let dishes = dishes.clone();
        async move { Ok(dishes.find_one(doc! { "dishId": candidate }).await?.is_some()) }
    })
    .await?;

    let name_si = gen_si(SiTarget::Dish, dish_id, SiField::Name);
    let description_si = gen_si(SiTarget::Dish, dish_id, SiField::Description);
    strings::insert_new(ctx, &name_si, &culture, req.name.trim()).await?;
    strings::insert_new(ctx, &description_si, &culture, req.description.trim()).await?;

    let mut dish = DishDoc {
        _id: None,
        metadata: Metadata::new(),
        dish_id,
        price: req.price,
        is_on_sale: false,
        old_price: req.price,
        name_si,
        description_si,
        nutri_profile: profile,
        images,
    };
    dish._id = Some(ctx.stores.dishes.insert_one(dish.clone()).await?);

    info!(dish_id, by = %caller.id_hex(), "Dish created");
    Ok(dish)
}

enum DishUpdate {
    AddImage(String),
    RemoveImage(String),
    Text(SiField, String),
    Nutrition(&'static str, i32),
    Price(i32),
}

fn parse_update(key: &str, value: &str) -> Result<DishUpdate> {
    let int = |value: &str| {
        value
            .trim()
            .parse::<i32>()
            .map_err(|_| CafeError::InvalidArgument(format!("'{key}' must be an integer")))
    };

    match key {
        "+image" => Ok(DishUpdate::AddImage(parse_image(value)?)),
        "-image" => Ok(DishUpdate::RemoveImage(parse_image(value)?)),
        "name" | "description" => {
            require(value, key)?;
            let field = if key == "name" { SiField::Name } else { SiField::Description };
            Ok(DishUpdate::Text(field, value.trim().to_string()))
        }
        "price" => match int(value)? {
            p if p < 0 => Err(CafeError::InvalidArgument("'price' cannot be negative".into())),
            p => Ok(DishUpdate::Price(p)),
        },
        other => match NUTRITION_KEYS.iter().find(|k| **k == other) {
            Some(k) => Ok(DishUpdate::Nutrition(*k, int(value)?)),
            None => Err(CafeError::InvalidArgument(format!(
                "Unknown dish update '{other}'"
            ))),
        },
    }
}

/// Replays the image changes on a copy of the list, in batch order.
fn check_images(current: &[String], updates: &[DishUpdate]) -> Result<()> {
    let mut images = current.to_vec();
    for change in updates {
        match change {
            DishUpdate::AddImage(image) => images.push(image.clone()),
            DishUpdate::RemoveImage(image) => {
                if images.is_empty() {
                    return Err(CafeError::Conflict(
                        "Cannot remove an image from a dish with no images".into(),
                    ));
                }
                images.retain(|i| i != image);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Apply a set of updates. All are validated before any is written.
pub async fn update(ctx: &Context, req: UpdateDishRequest) -> Result<DishDoc> {
    require_id(req.did, "did")?;
    if req.updates.is_empty() {
        return Err(CafeError::InvalidArgument("'updates' is required".into()));
    }
    let updates = req
        .updates
        .iter()
        .map(|(k, v)| parse_update(k, v))
        .collect::<Result<Vec<_>>>()?;

    let caller = require_catalogue_editor(ctx, &req.token).await?;
    let mut dish = load(ctx, req.did).await?;
    check_images(&dish.images, &updates)?;
    let culture = if updates.iter().any(|u| matches!(u, DishUpdate::Text(..))) {
        primary_culture(ctx).await?
    } else {
        String::new()
    };
    let filter = doc! { "dishId": req.did };

    for change in updates {
        match change {
            DishUpdate::AddImage(image) => {
                ctx.stores
                    .dishes
                    .update_one(filter.clone(), doc! { "$push": { "images": image } })
                    .await?;
            }
            DishUpdate::RemoveImage(image) => {
                ctx.stores
                    .dishes
                    .update_one(filter.clone(), doc! { "$pull": { "images": image } })
                    .await?;
            }
            DishUpdate::Text(field, content) => {
                let si = match field {
                    SiField::Name => &dish.name_si,
                    SiField::Description => &dish.description_si,
                };
                strings::update(ctx, si, &culture, &content).await?;
            }
            DishUpdate::Nutrition(key, value) => {
                let mut set = Document::new();
                set.insert(format!("nutriProfile.{key}"), value);
                ctx.stores
                    .dishes
                    .update_one(filter.clone(), doc! { "$set": set })
                    .await?;
            }
            DishUpdate::Price(price) => {
                // The previous price is kept to advertise a sale
                let on_sale = price < dish.price;
                ctx.stores
                    .dishes
                    .update_one(
                        filter.clone(),
                        doc! { "$set": {
                            "price": price,
                            "oldPrice": dish.price,
                            "isOnSale": on_sale,
                        } },
                    )
                    .await?;
                dish.old_price = dish.price;
                dish.price = price;
            }
        }
    }

    info!(dish_id = req.did, by = %caller.id_hex(), "Dish updated");
    load(ctx, req.did).await
}

/// Delete a dish, its strings and its menu entries.
pub async fn delete(ctx: &Context, req: DishTokenRequest) -> Result<()> {
    require_id(req.did, "did")?;
    let caller = require_catalogue_editor(ctx, &req.token).await?;
    let dish = load(ctx, req.did).await?;

    ctx.stores
        .dishes
        .delete_one(doc! { "dishId": req.did })
        .await?;
    strings::delete_by_si(ctx, &dish.name_si).await?;
    strings::delete_by_si(ctx, &dish.description_si).await?;
    ctx.stores
        .menus
        .update_many(
            doc! { "dishes": req.did },
            doc! { "$pull": { "dishes": req.did } },
        )
        .await?;

    info!(dish_id = req.did, by = %caller.id_hex(), "Dish deleted");
    Ok(())
}

pub async fn get(ctx: &Context, did: i32) -> Result<DishDoc> {
    require_id(did, "did")?;
    load(ctx, did).await
}
