//! 整份文档形式的集合数据
//!
//! 内存存储与本地回退存储共用：所有集合放在一个 JSON 对象里，
//! 以“读取-修改-整体写回”的方式操作。

use crate::pulse::serialization::{generate_id, now_timestamp};
use crate::pulse::store::types::{collections, key_string, ChangeKind, Filter, Order, Row};
use crate::pulse::store::StoreError;
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;

/// 所有集合组成的文档
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    collections: BTreeMap<String, Vec<Row>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 值解析；顶层必须是对象，每个集合必须是对象数组
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(StoreError::Validation("数据文档必须是 JSON 对象".to_string()).into());
        };

        let mut document = Self::new();
        for (name, rows) in map {
            let Value::Array(items) = rows else {
                return Err(
                    StoreError::Validation(format!("集合 {} 必须是数组", name)).into(),
                );
            };
            let mut parsed = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(row) => parsed.push(row),
                    other => {
                        return Err(StoreError::Validation(format!(
                            "集合 {} 中存在非对象记录: {}",
                            name, other
                        ))
                        .into())
                    }
                }
            }
            document.collections.insert(name, parsed);
        }
        Ok(document)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.collections
                .iter()
                .map(|(name, rows)| {
                    (
                        name.clone(),
                        Value::Array(rows.iter().cloned().map(Value::Object).collect()),
                    )
                })
                .collect(),
        )
    }

    /// 用已存储的集合覆盖默认集合，缺失的集合保留默认值
    pub fn merged_over(mut defaults: Document, stored: Document) -> Document {
        for (name, rows) in stored.collections {
            defaults.collections.insert(name, rows);
        }
        defaults
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn rows(&self, collection: &str) -> &[Row] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn set_rows(&mut self, collection: &str, rows: Vec<Row>) {
        self.collections.insert(collection.to_string(), rows);
    }

    fn rows_mut(&mut self, collection: &str) -> &mut Vec<Row> {
        self.collections.entry(collection.to_string()).or_default()
    }

    fn position_of(&self, collection: &str, id: &str) -> Option<usize> {
        let key = collections::key_field(collection);
        self.rows(collection)
            .iter()
            .position(|row| row.get(key).and_then(key_string).as_deref() == Some(id))
    }

    /// 按过滤条件和排序规则查询
    pub fn query(&self, collection: &str, filter: Option<&Filter>, order: Option<&Order>) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .rows(collection)
            .iter()
            .filter(|row| filter.map_or(true, |f| f.matches(row)))
            .cloned()
            .collect();
        if let Some(order) = order {
            order.sort(&mut rows);
        }
        rows
    }

    /// 检查唯一约束；`skip` 为正在被更新的行
    fn check_unique(&self, collection: &str, row: &Row, skip: Option<usize>) -> Result<()> {
        let fields = collections::unique_fields(collection);
        if fields.is_empty() {
            return Ok(());
        }
        let wanted: Vec<Option<String>> = fields
            .iter()
            .map(|f| row.get(*f).and_then(key_string))
            .collect();
        if wanted.iter().any(Option::is_none) {
            return Ok(());
        }

        let duplicate = self.rows(collection).iter().enumerate().any(|(index, existing)| {
            Some(index) != skip
                && fields
                    .iter()
                    .zip(wanted.iter())
                    .all(|(f, w)| existing.get(*f).and_then(key_string) == *w)
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "{} 已存在相同的 ({})",
                collection,
                fields.join(", ")
            ))
            .into());
        }
        Ok(())
    }

    /// 插入一行；缺少主键或创建时间时自动补齐
    pub fn insert(&mut self, collection: &str, mut row: Row) -> Result<Row> {
        let key = collections::key_field(collection);
        if !row.get(key).is_some_and(|v| key_string(v).is_some()) {
            if key != "id" {
                return Err(StoreError::Validation(format!(
                    "{} 缺少主键字段 {}",
                    collection, key
                ))
                .into());
            }
            row.insert(key.to_string(), Value::String(generate_id()));
        }
        row.entry("created_at")
            .or_insert_with(|| Value::String(now_timestamp()));

        if let Some(id) = row.get(key).and_then(key_string) {
            if self.position_of(collection, &id).is_some() {
                return Err(StoreError::Conflict(format!("{}/{} 已存在", collection, id)).into());
            }
        }
        self.check_unique(collection, &row, None)?;

        self.rows_mut(collection).push(row.clone());
        Ok(row)
    }

    /// 合并更新一行，主键不可修改；返回 (旧行, 新行)
    pub fn update(&mut self, collection: &str, id: &str, patch: Row) -> Result<(Row, Row)> {
        let index = self
            .position_of(collection, id)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let key = collections::key_field(collection);

        let old = self.rows(collection)[index].clone();
        let mut merged = old.clone();
        for (field, value) in patch {
            if field != key {
                merged.insert(field, value);
            }
        }
        self.check_unique(collection, &merged, Some(index))?;

        self.rows_mut(collection)[index] = merged.clone();
        Ok((old, merged))
    }

    /// 删除一行并返回被删除的行
    pub fn delete(&mut self, collection: &str, id: &str) -> Result<Row> {
        let index = self
            .position_of(collection, id)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        Ok(self.rows_mut(collection).remove(index))
    }

    /// 按冲突键插入或合并更新
    pub fn upsert(&mut self, collection: &str, row: Row, conflict_key: &str) -> Result<(ChangeKind, Row)> {
        let wanted = row.get(conflict_key).and_then(key_string).ok_or_else(|| {
            StoreError::Validation(format!("{} 缺少冲突键 {}", collection, conflict_key))
        })?;
        let existing = self
            .rows(collection)
            .iter()
            .position(|r| r.get(conflict_key).and_then(key_string).as_deref() == Some(&wanted));

        match existing {
            Some(index) => {
                let mut merged = self.rows(collection)[index].clone();
                for (field, value) in row {
                    merged.insert(field, value);
                }
                merged.insert("updated_at".to_string(), Value::String(now_timestamp()));
                self.rows_mut(collection)[index] = merged.clone();
                Ok((ChangeKind::Update, merged))
            }
            None => Ok((ChangeKind::Insert, self.insert(collection, row)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::store::is_conflict;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn insert_assigns_id_and_timestamp() {
        let mut doc = Document::new();
        let saved = doc
            .insert("votes", row(json!({ "player_id": "42", "user_id": "u1", "value": 1 })))
            .unwrap();
        assert!(saved["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(saved.contains_key("created_at"));
        assert_eq!(doc.rows("votes").len(), 1);
    }

    #[test]
    fn likes_are_unique_per_subject_and_user() {
        let mut doc = Document::new();
        let like = row(json!({ "subject_id": "player:1", "user_id": "u1" }));
        doc.insert("likes", like.clone()).unwrap();
        let err = doc.insert("likes", like).unwrap_err();
        assert!(is_conflict(&err));
        assert_eq!(doc.rows("likes").len(), 1);

        // 投票不做唯一约束
        let vote = row(json!({ "player_id": "1", "user_id": "u1", "value": 1 }));
        doc.insert("votes", vote.clone()).unwrap();
        doc.insert("votes", vote).unwrap();
        assert_eq!(doc.rows("votes").len(), 2);
    }

    #[test]
    fn update_merges_and_keeps_key() {
        let mut doc = Document::new();
        doc.insert("posts", row(json!({ "id": "p1", "content": "a", "likes_count": 1 })))
            .unwrap();
        let (old, new) = doc
            .update("posts", "p1", row(json!({ "id": "zz", "content": "b" })))
            .unwrap();
        assert_eq!(old["content"], json!("a"));
        assert_eq!(new["content"], json!("b"));
        assert_eq!(new["id"], json!("p1"));
        assert_eq!(new["likes_count"], json!(1));

        let err = doc.update("posts", "missing", Row::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn upsert_profiles_by_user_id() {
        let mut doc = Document::new();
        let (kind, _) = doc
            .upsert("profiles", row(json!({ "user_id": "u1", "username": "a" })), "user_id")
            .unwrap();
        assert_eq!(kind, ChangeKind::Insert);
        let (kind, merged) = doc
            .upsert("profiles", row(json!({ "user_id": "u1", "bio": "fan" })), "user_id")
            .unwrap();
        assert_eq!(kind, ChangeKind::Update);
        assert_eq!(merged["username"], json!("a"));
        assert_eq!(merged["bio"], json!("fan"));
        assert_eq!(doc.rows("profiles").len(), 1);
    }

    #[test]
    fn from_value_rejects_malformed_documents() {
        assert!(Document::from_value(json!([1])).is_err());
        assert!(Document::from_value(json!({ "players": {} })).is_err());
        assert!(Document::from_value(json!({ "players": [1] })).is_err());

        let doc = Document::from_value(json!({ "players": [{ "id": "1" }] })).unwrap();
        assert_eq!(Document::from_value(doc.to_value()).unwrap(), doc);
    }

    #[test]
    fn stored_collections_override_defaults() {
        let defaults = Document::from_value(json!({
            "players": [{ "id": "1" }],
            "votes": [{ "id": "v1" }]
        }))
        .unwrap();
        let stored = Document::from_value(json!({ "votes": [] })).unwrap();
        let merged = Document::merged_over(defaults, stored);
        assert_eq!(merged.rows("players").len(), 1);
        assert!(merged.rows("votes").is_empty());
    }
}
