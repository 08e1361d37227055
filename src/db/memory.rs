//! In-process document store
//!
//! Keeps every collection as a vector of BSON documents behind a lock and
//! evaluates the small subset of MongoDB filter and update syntax the
//! services issue. Unique indexes declared by the schema are enforced on
//! insert, so duplicate-key behavior matches the MongoDB backend.

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use std::marker::PhantomData;
use tokio::sync::RwLock;

use crate::db::store::{with_updated_at, DocumentStore, Schema};
use crate::types::{CafeError, Result};

/// A collection held in memory
pub struct MemoryStore<T> {
    docs: RwLock<Vec<Document>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
            _marker: PhantomData,
        }
    }
}

impl<T: Schema> MemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    /// Reject `doc` if it collides with a stored document on `_id` or on
    /// any unique index of the schema.
    fn check_unique(existing: &[Document], doc: &Document) -> Result<()> {
        let mut unique_keys: Vec<Vec<String>> = vec![vec!["_id".to_string()]];
        for (keys, opts) in T::into_indices() {
            if opts.and_then(|o| o.unique).unwrap_or(false) {
                unique_keys.push(keys.keys().cloned().collect());
            }
        }

        for keys in unique_keys {
            let collides = existing.iter().any(|other| {
                keys.iter().all(|k| {
                    match (get_path(doc, k), get_path(other, k)) {
                        (Some(a), Some(b)) => bson_eq(a, b),
                        _ => false,
                    }
                })
            });
            if collides {
                return Err(CafeError::Conflict(format!(
                    "Duplicate key on ({})",
                    keys.join(", ")
                )));
            }
        }
        Ok(())
    }

    async fn update(&self, filter: Document, update: Document, many: bool) -> Result<u64> {
        let update = with_updated_at(update);
        let mut docs = self.docs.write().await;
        let mut matched = 0u64;

        for doc in docs.iter_mut() {
            if !matches(doc, &filter)? {
                continue;
            }
            apply_update(doc, &update)?;
            matched += 1;
            if !many {
                break;
            }
        }
        Ok(matched)
    }

    async fn delete(&self, filter: Document, many: bool) -> Result<u64> {
        let mut docs = self.docs.write().await;
        let mut deleted = 0u64;
        let mut index = 0;

        while index < docs.len() {
            if (many || deleted == 0) && matches(&docs[index], &filter)? {
                docs.remove(index);
                deleted += 1;
            } else {
                index += 1;
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl<T: Schema> DocumentStore<T> for MemoryStore<T> {
    async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        let docs = self.docs.read().await;
        for doc in docs.iter() {
            if matches(doc, &filter)? {
                return Ok(Some(bson::from_document(doc.clone())?));
            }
        }
        Ok(None)
    }

    async fn find_many(&self, filter: Document) -> Result<Vec<T>> {
        let docs = self.docs.read().await;
        let mut found = Vec::new();
        for doc in docs.iter() {
            if matches(doc, &filter)? {
                found.push(bson::from_document(doc.clone())?);
            }
        }
        Ok(found)
    }

    async fn insert_one(&self, mut item: T) -> Result<ObjectId> {
        item.mut_metadata().touch();
        let mut doc = bson::to_document(&item)?;

        let id = match doc.get("_id") {
            Some(Bson::ObjectId(oid)) => *oid,
            _ => {
                let oid = ObjectId::new();
                doc.insert("_id", oid);
                oid
            }
        };

        let mut docs = self.docs.write().await;
        Self::check_unique(&docs, &doc)?;
        docs.push(doc);
        Ok(id)
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<u64> {
        self.update(filter, update, false).await
    }

    async fn update_many(&self, filter: Document, update: Document) -> Result<u64> {
        self.update(filter, update, true).await
    }

    async fn delete_one(&self, filter: Document) -> Result<u64> {
        self.delete(filter, false).await
    }

    async fn delete_many(&self, filter: Document) -> Result<u64> {
        self.delete(filter, true).await
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Filter evaluation
// =============================================================================

fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        None => doc.get(path),
        Some((head, rest)) => match doc.get(head) {
            Some(Bson::Document(inner)) => get_path(inner, rest),
            _ => None,
        },
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Equality with numeric types compared by value, as MongoDB does.
fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Does the stored value satisfy an equality condition?
///
/// A missing field matches `null`; an array matches when it equals the
/// condition or contains it.
fn value_matches(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| bson_eq(item, expected))
        }
        Some(value) => bson_eq(value, expected),
    }
}

fn is_operator_document(value: &Bson) -> Option<&Document> {
    match value {
        Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => Some(d),
        _ => None,
    }
}

fn matches(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        if key.starts_with('$') {
            return Err(CafeError::Database(format!(
                "Unsupported filter operator: {key}"
            )));
        }

        let value = get_path(doc, key);
        let satisfied = match is_operator_document(condition) {
            None => value_matches(value, condition),
            Some(ops) => {
                let mut all = true;
                for (op, arg) in ops {
                    let ok = match op.as_str() {
                        "$ne" => !value_matches(value, arg),
                        "$in" => match arg {
                            Bson::Array(options) => {
                                options.iter().any(|o| value_matches(value, o))
                            }
                            _ => {
                                return Err(CafeError::Database("$in needs an array".into()))
                            }
                        },
                        "$exists" => value.is_some() == arg.as_bool().unwrap_or(true),
                        other => {
                            return Err(CafeError::Database(format!(
                                "Unsupported filter operator: {other}"
                            )))
                        }
                    };
                    all &= ok;
                }
                all
            }
        };

        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

// =============================================================================
// Update evaluation
// =============================================================================

fn set_path(doc: &mut Document, path: &str, value: Bson) -> Result<()> {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !doc.contains_key(head) {
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(CafeError::Database(format!(
                    "Cannot set '{path}': '{head}' is not a document"
                ))),
            }
        }
    }
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

fn get_path_mut<'a>(doc: &'a mut Document, path: &str) -> Option<&'a mut Bson> {
    match path.split_once('.') {
        None => doc.get_mut(path),
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(inner)) => get_path_mut(inner, rest),
            _ => None,
        },
    }
}

fn increment(current: &Bson, by: &Bson) -> Result<Bson> {
    let sum = match (current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => a.checked_add(*b).map(Bson::Int32),
        (Bson::Int32(a), Bson::Int64(b)) => i64::from(*a).checked_add(*b).map(Bson::Int64),
        (Bson::Int64(a), Bson::Int32(b)) => a.checked_add(i64::from(*b)).map(Bson::Int64),
        (Bson::Int64(a), Bson::Int64(b)) => a.checked_add(*b).map(Bson::Int64),
        _ => match (as_number(current), as_number(by)) {
            (Some(a), Some(b)) => Some(Bson::Double(a + b)),
            _ => None,
        },
    };
    sum.ok_or_else(|| CafeError::Database("Cannot apply $inc to this field".into()))
}

fn apply_update(doc: &mut Document, update: &Document) -> Result<()> {
    for (op, fields) in update {
        let fields = match fields {
            Bson::Document(fields) => fields,
            _ => {
                return Err(CafeError::Database(format!(
                    "Update stage {op} needs a document"
                )))
            }
        };

        for (path, value) in fields {
            match op.as_str() {
                "$set" => set_path(doc, path, value.clone())?,
                "$unset" => remove_path(doc, path),
                "$push" => match get_path_mut(doc, path) {
                    Some(Bson::Array(items)) => items.push(value.clone()),
                    None | Some(Bson::Null) => set_path(doc, path, Bson::Array(vec![value.clone()]))?,
                    Some(_) => {
                        return Err(CafeError::Database(format!(
                            "Cannot $push to non-array field '{path}'"
                        )))
                    }
                },
                "$pull" => {
                    if let Some(Bson::Array(items)) = get_path_mut(doc, path) {
                        items.retain(|item| !bson_eq(item, value));
                    }
                }
                "$inc" => {
                    let next = match get_path(doc, path) {
                        Some(current) => increment(current, value)?,
                        None => value.clone(),
                    };
                    set_path(doc, path, next)?;
                }
                other => {
                    return Err(CafeError::Database(format!(
                        "Unsupported update operator: {other}"
                    )))
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::Metadata;
    use crate::db::store::{IntoIndexes, MutMetadata};
    use bson::doc;
    use mongodb::options::IndexOptions;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Debug, Default)]
    struct Item {
        #[serde(skip_serializing_if = "Option::is_none")]
        _id: Option<ObjectId>,
        #[serde(default)]
        metadata: Metadata,
        code: String,
        count: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bound: Option<i32>,
        #[serde(default)]
        tags: Vec<String>,
    }

    impl IntoIndexes for Item {
        fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
            vec![(
                doc! { "code": 1 },
                Some(IndexOptions::builder().unique(true).build()),
            )]
        }
    }

    impl MutMetadata for Item {
        fn mut_metadata(&mut self) -> &mut Metadata {
            &mut self.metadata
        }
    }

    fn item(code: &str, count: i32) -> Item {
        Item {
            code: code.to_string(),
            count,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_metadata() {
        let store = MemoryStore::<Item>::new();
        let id = store.insert_one(item("a", 1)).await.unwrap();

        let found = store.find_one(doc! { "_id": id }).await.unwrap().unwrap();
        assert_eq!(found._id, Some(id));
        assert!(found.metadata.created_at.is_some());
    }

    #[tokio::test]
    async fn test_unique_index_enforced() {
        let store = MemoryStore::<Item>::new();
        store.insert_one(item("a", 1)).await.unwrap();

        let result = store.insert_one(item("a", 2)).await;
        assert!(matches!(result, Err(CafeError::Conflict(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_filters() {
        let store = MemoryStore::<Item>::new();
        let mut bound = item("a", 1);
        bound.bound = Some(5);
        bound.tags = vec!["x".into(), "y".into()];
        store.insert_one(bound).await.unwrap();
        store.insert_one(item("b", 2)).await.unwrap();

        // Numeric equality across integer widths
        assert_eq!(store.find_many(doc! { "count": 1i64 }).await.unwrap().len(), 1);
        // Missing field matches null
        assert_eq!(store.find_many(doc! { "bound": Bson::Null }).await.unwrap().len(), 1);
        // Array contains
        assert_eq!(store.find_many(doc! { "tags": "y" }).await.unwrap().len(), 1);
        assert_eq!(
            store.find_many(doc! { "code": { "$ne": "a" } }).await.unwrap()[0].code,
            "b"
        );
        assert_eq!(
            store
                .find_many(doc! { "code": { "$in": ["a", "b", "c"] } })
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(store.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_updates() {
        let store = MemoryStore::<Item>::new();
        store.insert_one(item("a", 1)).await.unwrap();

        let matched = store
            .update_one(
                doc! { "code": "a" },
                doc! {
                    "$set": { "bound": 7 },
                    "$inc": { "count": 4 },
                    "$push": { "tags": "new" },
                },
            )
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let found = store.find_one(doc! { "code": "a" }).await.unwrap().unwrap();
        assert_eq!(found.bound, Some(7));
        assert_eq!(found.count, 5);
        assert_eq!(found.tags, vec!["new".to_string()]);

        store
            .update_one(
                doc! { "code": "a" },
                doc! { "$pull": { "tags": "new" }, "$unset": { "bound": "" } },
            )
            .await
            .unwrap();
        let found = store.find_one(doc! { "code": "a" }).await.unwrap().unwrap();
        assert!(found.tags.is_empty());
        assert_eq!(found.bound, None);
    }

    #[tokio::test]
    async fn test_update_many_and_delete() {
        let store = MemoryStore::<Item>::new();
        store.insert_one(item("a", 1)).await.unwrap();
        store.insert_one(item("b", 1)).await.unwrap();
        store.insert_one(item("c", 2)).await.unwrap();

        let matched = store
            .update_many(doc! { "count": 1 }, doc! { "$set": { "bound": -1 } })
            .await
            .unwrap();
        assert_eq!(matched, 2);

        assert_eq!(store.delete_one(doc! { "count": 1 }).await.unwrap(), 1);
        assert_eq!(store.delete_many(doc! {}).await.unwrap(), 2);
        assert!(store.is_empty().await);
        assert_eq!(store.delete_one(doc! { "code": "a" }).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_operator_is_error() {
        let store = MemoryStore::<Item>::new();
        store.insert_one(item("a", 1)).await.unwrap();

        assert!(store
            .find_many(doc! { "count": { "$gt": 0 } })
            .await
            .is_err());
        assert!(store
            .update_one(doc! {}, doc! { "$rename": { "code": "c" } })
            .await
            .is_err());
    }
}
