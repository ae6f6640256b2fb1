use crate::pulse::store::{Row, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 主键反序列化函数（存储端可能返回字符串或数字，统一为字符串）
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "主键必须是字符串或数字，实际为: {}",
            other
        ))),
    }
}

/// 可选主键反序列化函数（支持 null 值）
pub fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "主键必须是字符串或数字，实际为: {}",
            other
        ))),
    }
}

/// 序列化为一行记录（必须是 JSON 对象）
pub fn to_row<T: Serialize>(value: &T) -> anyhow::Result<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Validation(format!("记录必须是 JSON 对象，实际为: {}", other)).into()),
    }
}

/// 从一行记录反序列化为实体，缺少必填字段时报错
pub fn from_row<T: DeserializeOwned>(row: Row) -> anyhow::Result<T> {
    serde_json::from_value(Value::Object(row))
        .map_err(|e| StoreError::Decode(e.to_string()).into())
}

/// 去掉值为 null 的字段（存储端会把 null 列当作校验错误）
pub fn strip_nulls(row: Row) -> Row {
    row.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

/// 生成记录 ID
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 当前时间（RFC 3339）
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
