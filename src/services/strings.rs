//! Localized strings
//!
//! Display text lives outside the documents it belongs to. A document
//! stores a string identifier (SI) such as `DISH%42%NAME`, and each
//! culture's text is a separate [`LocalizedStringDoc`] carrying that SI.

use bson::doc;
use std::fmt;
use std::str::FromStr;

use crate::db::LocalizedStringDoc;
use crate::services::{require, Context};
use crate::types::{CafeError, Result};

const SI_SEPARATOR: char = '%';

/// What an SI belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiTarget {
    Menu,
    Dish,
    Category,
    Other,
}

impl SiTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiTarget::Menu => "MENU",
            SiTarget::Dish => "DISH",
            SiTarget::Category => "CATEGORY",
            SiTarget::Other => "OTHER",
        }
    }
}

impl FromStr for SiTarget {
    type Err = CafeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MENU" => Ok(SiTarget::Menu),
            "DISH" => Ok(SiTarget::Dish),
            "CATEGORY" => Ok(SiTarget::Category),
            "OTHER" => Ok(SiTarget::Other),
            _ => Err(CafeError::InvalidArgument(format!(
                "'{s}' is not one of MENU, DISH, CATEGORY, OTHER"
            ))),
        }
    }
}

/// Which field of the owner an SI names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiField {
    Name,
    Description,
}

impl SiField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiField::Name => "NAME",
            SiField::Description => "DESCRIPTION",
        }
    }
}

impl FromStr for SiField {
    type Err = CafeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NAME" => Ok(SiField::Name),
            "DESCRIPTION" => Ok(SiField::Description),
            _ => Err(CafeError::InvalidArgument(format!(
                "'{s}' is not one of NAME, DESCRIPTION"
            ))),
        }
    }
}

impl fmt::Display for SiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SiField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build `WHAT%id%WHERE`
pub fn gen_si(what_for: SiTarget, id: i32, where_at: SiField) -> String {
    format!("{what_for}{SI_SEPARATOR}{id}{SI_SEPARATOR}{where_at}")
}

/// True iff `si` has the shape produced by [`gen_si`].
pub fn validate_si(si: &str) -> bool {
    let parts: Vec<&str> = si.split(SI_SEPARATOR).collect();
    match parts.as_slice() {
        [what, id, where_at] => {
            what.parse::<SiTarget>().is_ok()
                && what.chars().all(|c| c.is_ascii_uppercase())
                && id.parse::<i32>().is_ok()
                && where_at.parse::<SiField>().is_ok()
                && where_at.chars().all(|c| c.is_ascii_uppercase())
        }
        _ => false,
    }
}

/// Insert one culture's text and return every string sharing its SI.
pub async fn insert_new(
    ctx: &Context,
    si: &str,
    culture: &str,
    content: &str,
) -> Result<Vec<LocalizedStringDoc>> {
    require(culture, "culture")?;
    require(content, "content")?;
    if !validate_si(si) {
        return Err(CafeError::InvalidArgument(format!("'{si}' is not a valid SI")));
    }

    ctx.stores
        .strings
        .insert_one(LocalizedStringDoc::new(culture, content, si))
        .await?;
    get_by_si(ctx, si).await
}

pub async fn get_by_si(ctx: &Context, si: &str) -> Result<Vec<LocalizedStringDoc>> {
    ctx.stores.strings.find_many(doc! { "si": si }).await
}

/// Public lookup. With a culture, only that culture's string is returned.
pub async fn get(ctx: &Context, si: &str, culture: Option<&str>) -> Result<Vec<LocalizedStringDoc>> {
    require(si, "si")?;

    let found = match culture.filter(|c| !c.trim().is_empty()) {
        Some(culture) => {
            ctx.stores
                .strings
                .find_many(doc! { "si": si, "culture": culture })
                .await?
        }
        None => get_by_si(ctx, si).await?,
    };

    if found.is_empty() {
        return Err(CafeError::NotFound(format!("No strings for '{si}'")));
    }
    Ok(found)
}

/// Set the text for one culture. Other cultures of the SI are marked
/// outdated since they no longer translate the current text.
pub async fn update(ctx: &Context, si: &str, culture: &str, content: &str) -> Result<()> {
    require(culture, "culture")?;
    require(content, "content")?;

    let existing = get_by_si(ctx, si).await?;
    if existing.is_empty() {
        return Err(CafeError::NotFound(format!("No strings for '{si}'")));
    }

    if existing.iter().any(|s| s.culture == culture) {
        ctx.stores
            .strings
            .update_one(
                doc! { "si": si, "culture": culture },
                doc! { "$set": { "content": content, "outdated": false } },
            )
            .await?;
    } else {
        ctx.stores
            .strings
            .insert_one(LocalizedStringDoc::new(culture, content, si))
            .await?;
    }

    ctx.stores
        .strings
        .update_many(
            doc! { "si": si, "culture": { "$ne": culture } },
            doc! { "$set": { "outdated": true } },
        )
        .await?;
    Ok(())
}

/// Remove every culture's text for an SI
pub async fn delete_by_si(ctx: &Context, si: &str) -> Result<u64> {
    ctx.stores.strings.delete_many(doc! { "si": si }).await
}
