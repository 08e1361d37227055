//! Menus: named, ordered lists of dishes

use bson::doc;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::db::{MenuDoc, Metadata};
use crate::services::dishes::{primary_culture, require_catalogue_editor};
use crate::services::strings::{self, gen_si, SiField, SiTarget};
use crate::services::{missing_id, require, require_id, unique_id, Context};
use crate::types::{CafeError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMenuRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "missing_id", alias = "firstDIsh")]
    pub first_dish: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMenuRequest {
    #[serde(default = "missing_id")]
    pub mid: i32,
    #[serde(default)]
    pub token: String,
    /// `+dish`, `-dish`, `name` or `description` to a value
    #[serde(default)]
    pub updates: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuTokenRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default = "missing_id", alias = "id")]
    pub mid: i32,
}

async fn load(ctx: &Context, mid: i32) -> Result<MenuDoc> {
    ctx.stores
        .menus
        .find_one(doc! { "menuId": mid })
        .await?
        .ok_or_else(|| CafeError::NotFound(format!("Menu {mid} not found")))
}

async fn dish_exists(ctx: &Context, did: i32) -> Result<bool> {
    Ok(ctx
        .stores
        .dishes
        .find_one(doc! { "dishId": did })
        .await?
        .is_some())
}

/// Create a menu holding one existing dish.
pub async fn create(ctx: &Context, req: CreateMenuRequest) -> Result<MenuDoc> {
    require(&req.name, "name")?;
    require(&req.description, "description")?;
    require_id(req.first_dish, "firstDish")?;

    let caller = require_catalogue_editor(ctx, &req.token).await?;
    if !dish_exists(ctx, req.first_dish).await? {
        return Err(CafeError::InvalidArgument(format!(
            "First dish {} does not exist",
            req.first_dish
        )));
    }
    let culture = primary_culture(ctx).await?;

    let menus = ctx.stores.menus.clone();
    let menu_id = unique_id(|candidate| {
        let menus = menus.clone();
        async move { Ok(menus.find_one(doc! { "menuId": candidate }).await?.is_some()) }
    })
    .await?;

    let name_si = gen_si(SiTarget::Menu, menu_id, SiField::Name);
    let description_si = gen_si(SiTarget::Menu, menu_id, SiField::Description);
    strings::insert_new(ctx, &name_si, &culture, req.name.trim()).await?;
    strings::insert_new(ctx, &description_si, &culture, req.description.trim()).await?;

    let mut menu = MenuDoc {
        _id: None,
        metadata: Metadata::new(),
        menu_id,
        name_si,
        description_si,
        dishes: vec![req.first_dish],
    };
    menu._id = Some(ctx.stores.menus.insert_one(menu.clone()).await?);

    info!(menu_id, by = %caller.id_hex(), "Menu created");
    Ok(menu)
}

/// Add or remove dishes and edit the menu's texts.
pub async fn update(ctx: &Context, req: UpdateMenuRequest) -> Result<MenuDoc> {
    require_id(req.mid, "mid")?;
    if req.updates.is_empty() {
        return Err(CafeError::InvalidArgument("'updates' is required".into()));
    }

    let caller = require_catalogue_editor(ctx, &req.token).await?;
    let mut menu = load(ctx, req.mid).await?;
    let filter = doc! { "menuId": req.mid };

    for (key, value) in &req.updates {
        match key.as_str() {
            "+dish" | "-dish" => {
                let did: i32 = value.trim().parse().map_err(|_| {
                    CafeError::InvalidArgument(format!("'{value}' is not a valid dish id"))
                })?;
                if !dish_exists(ctx, did).await? {
                    return Err(CafeError::NotFound(format!("Dish {did} not found")));
                }

                let present = menu.dishes.contains(&did);
                let update = if key == "+dish" {
                    if present {
                        return Err(CafeError::Conflict(format!("Dish {did} is already in the menu")));
                    }
                    menu.dishes.push(did);
                    doc! { "$push": { "dishes": did } }
                } else {
                    if !present {
                        return Err(CafeError::Conflict(format!("Dish {did} is not in the menu")));
                    }
                    menu.dishes.retain(|d| *d != did);
                    doc! { "$pull": { "dishes": did } }
                };
                ctx.stores.menus.update_one(filter.clone(), update).await?;
            }
            "name" | "description" => {
                require(value, key)?;
                let culture = primary_culture(ctx).await?;
                let si = if key == "name" { &menu.name_si } else { &menu.description_si };
                strings::update(ctx, si, &culture, value.trim()).await?;
            }
            other => {
                return Err(CafeError::InvalidArgument(format!(
                    "Unknown menu update '{other}'"
                )))
            }
        }
    }

    info!(menu_id = req.mid, by = %caller.id_hex(), "Menu updated");
    load(ctx, req.mid).await
}

/// Delete a menu and its strings
pub async fn delete(ctx: &Context, req: MenuTokenRequest) -> Result<()> {
    require_id(req.mid, "mid")?;
    let caller = require_catalogue_editor(ctx, &req.token).await?;
    let menu = load(ctx, req.mid).await?;

    ctx.stores
        .menus
        .delete_one(doc! { "menuId": req.mid })
        .await?;
    strings::delete_by_si(ctx, &menu.name_si).await?;
    strings::delete_by_si(ctx, &menu.description_si).await?;

    info!(menu_id = req.mid, by = %caller.id_hex(), "Menu deleted");
    Ok(())
}

pub async fn get(ctx: &Context, mid: i32) -> Result<MenuDoc> {
    require_id(mid, "mid")?;
    load(ctx, mid).await
}

pub async fn get_all(ctx: &Context) -> Result<Vec<MenuDoc>> {
    ctx.stores.menus.find_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::services::dishes::tests::{latte, token, with_instance};
    use crate::services::dishes::{self, DishTokenRequest};

    async fn setup() -> (Context, String, i32) {
        let ctx = Context::in_memory();
        with_instance(&ctx).await;
        let general = token(&ctx, vec![Role::General]).await;
        let dish = dishes::new_dish(&ctx, latte(&general)).await.unwrap();
        (ctx, general, dish.dish_id)
    }

    fn breakfast(token: &str, first_dish: i32) -> CreateMenuRequest {
        CreateMenuRequest {
            token: token.to_string(),
            name: "Breakfast".into(),
            description: "Served until noon".into(),
            first_dish,
        }
    }

    #[tokio::test]
    async fn test_create_requires_existing_dish() {
        let (ctx, general, did) = setup().await;

        let menu = create(&ctx, breakfast(&general, did)).await.unwrap();
        assert_eq!(menu.dishes, vec![did]);
        assert_eq!(get_all(&ctx).await.unwrap().len(), 1);

        let missing = create(&ctx, breakfast(&general, did.wrapping_add(1).max(0))).await;
        assert!(matches!(missing, Err(CafeError::InvalidArgument(_))));
    }

    #[test]
    fn test_first_dish_alias() {
        let req: CreateMenuRequest =
            serde_json::from_str(r#"{"token":"t","name":"n","description":"d","firstDIsh":4}"#)
                .unwrap();
        assert_eq!(req.first_dish, 4);
        let req: CreateMenuRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.first_dish, -1);
    }

    #[tokio::test]
    async fn test_update_dishes() {
        let (ctx, general, did) = setup().await;
        let second = dishes::new_dish(&ctx, latte(&general)).await.unwrap().dish_id;
        let menu = create(&ctx, breakfast(&general, did)).await.unwrap();

        let updated = update(
            &ctx,
            UpdateMenuRequest {
                mid: menu.menu_id,
                token: general.clone(),
                updates: BTreeMap::from([("+dish".to_string(), second.to_string())]),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.dishes, vec![did, second]);

        let duplicate = update(
            &ctx,
            UpdateMenuRequest {
                mid: menu.menu_id,
                token: general.clone(),
                updates: BTreeMap::from([("+dish".to_string(), second.to_string())]),
            },
        )
        .await;
        assert!(matches!(duplicate, Err(CafeError::Conflict(_))));

        let removed = update(
            &ctx,
            UpdateMenuRequest {
                mid: menu.menu_id,
                token: general.clone(),
                updates: BTreeMap::from([("-dish".to_string(), did.to_string())]),
            },
        )
        .await
        .unwrap();
        assert_eq!(removed.dishes, vec![second]);

        let absent = update(
            &ctx,
            UpdateMenuRequest {
                mid: menu.menu_id,
                token: general,
                updates: BTreeMap::from([("-dish".to_string(), did.to_string())]),
            },
        )
        .await;
        assert!(matches!(absent, Err(CafeError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_name_and_delete() {
        let (ctx, general, did) = setup().await;
        let menu = create(&ctx, breakfast(&general, did)).await.unwrap();

        update(
            &ctx,
            UpdateMenuRequest {
                mid: menu.menu_id,
                token: general.clone(),
                updates: BTreeMap::from([("name".to_string(), "Brunch".to_string())]),
            },
        )
        .await
        .unwrap();
        let name = strings::get(&ctx, &menu.name_si, Some("en")).await.unwrap();
        assert_eq!(name[0].content, "Brunch");

        delete(
            &ctx,
            MenuTokenRequest {
                token: general,
                mid: menu.menu_id,
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            get(&ctx, menu.menu_id).await,
            Err(CafeError::NotFound(_))
        ));
        assert!(strings::get_by_si(&ctx, &menu.name_si).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_dish_removes_it_from_menus() {
        let (ctx, general, did) = setup().await;
        let menu = create(&ctx, breakfast(&general, did)).await.unwrap();

        dishes::delete(
            &ctx,
            DishTokenRequest {
                did,
                token: general,
            },
        )
        .await
        .unwrap();
        assert!(get(&ctx, menu.menu_id).await.unwrap().dishes.is_empty());
    }
}
