//! 远程存储 HTTP API 客户端
//!
//! PostgREST 风格：`/rest/v1/<collection>?field=eq.value&order=field.desc`

use crate::pulse::store::types::{key_string, Filter, Order, Row, StoreError};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error, info};

/// 存储端返回的错误体
#[derive(Debug, Default, Deserialize)]
pub struct RestErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// 把失败的 HTTP 响应归类为存储错误
pub fn status_error(status: StatusCode, body: &str, collection: &str, id: &str) -> StoreError {
    let parsed: RestErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .or(parsed.details.clone())
        .unwrap_or_else(|| body.to_string());

    // 23505: 唯一约束冲突
    if parsed.code.as_deref() == Some("23505") || status == StatusCode::CONFLICT {
        return StoreError::Conflict(message);
    }
    // PGRST116: 单行查询无结果
    if parsed.code.as_deref() == Some("PGRST116") || status == StatusCode::NOT_FOUND {
        return StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };
    }
    match status {
        StatusCode::UNAUTHORIZED => StoreError::Auth(message),
        StatusCode::FORBIDDEN => StoreError::Permission(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            StoreError::Validation(message)
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => StoreError::Network(message),
        _ => StoreError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

fn value_param(filter: &Filter) -> String {
    key_string(&filter.value).unwrap_or_else(|| filter.value.to_string())
}

/// 集合 HTTP API 客户端
pub struct RestApi {
    client: reqwest::Client,
    api_base_url: String,
}

impl RestApi {
    /// `client` 应该已经在外部配置好认证头
    pub fn new(client: reqwest::Client, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url,
        }
    }

    fn table_url(&self, collection: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.api_base_url.trim_end_matches('/'),
            collection
        )
    }

    /// 发送请求并读取行数组
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
        collection: &str,
        id: &str,
    ) -> Result<Vec<Row>> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
            .context(format!("{} {} 请求失败", operation, collection))?;

        let status = response.status();
        // 读取 body bytes（只能读取一次）
        let body_bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
            .context("读取响应 body 失败")?;
        let body_str = String::from_utf8_lossy(&body_bytes);
        debug!("[RestAPI] {} {} 响应 Body: {}", operation, collection, body_str);

        if !status.is_success() {
            error!(
                "[RestAPI] {} {} 请求失败，HTTP状态: {}, 响应: {}",
                operation, collection, status, body_str
            );
            return Err(status_error(status, &body_str, collection, id).into());
        }

        if body_bytes.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<Row> = serde_json::from_slice(&body_bytes).map_err(|e| {
            error!(
                "[RestAPI] {} {} 反序列化失败: {:?}\n原始响应: {}",
                operation, collection, e, body_str
            );
            StoreError::Decode(e.to_string())
        })?;
        Ok(rows)
    }

    fn first_row(rows: Vec<Row>, collection: &str, id: &str) -> Result<Row> {
        rows.into_iter().next().ok_or_else(|| {
            StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }
            .into()
        })
    }

    pub async fn select(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        order: Option<&Order>,
    ) -> Result<Vec<Row>> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        if let Some(filter) = filter {
            params.push((filter.field.clone(), format!("eq.{}", value_param(filter))));
        }
        if let Some(order) = order {
            let direction = if order.descending { "desc" } else { "asc" };
            params.push(("order".to_string(), format!("{}.{}", order.field, direction)));
        }

        info!("[RestAPI] 📡 查询 {}", collection);
        let request = self.client.get(self.table_url(collection)).query(&params);
        self.send(request, "查询", collection, "").await
    }

    pub async fn insert(&self, collection: &str, row: &Row) -> Result<Row> {
        let request = self
            .client
            .post(self.table_url(collection))
            .header("Prefer", "return=representation")
            .json(row);
        let rows = self.send(request, "插入", collection, "").await?;
        Self::first_row(rows, collection, "")
    }

    pub async fn update(&self, collection: &str, key_field: &str, id: &str, patch: &Row) -> Result<Row> {
        let request = self
            .client
            .patch(self.table_url(collection))
            .query(&[(key_field, format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(patch);
        let rows = self.send(request, "更新", collection, id).await?;
        // 没有命中任何行
        Self::first_row(rows, collection, id)
    }

    /// 返回被删除的行
    pub async fn delete(&self, collection: &str, key_field: &str, id: &str) -> Result<Row> {
        let request = self
            .client
            .delete(self.table_url(collection))
            .query(&[(key_field, format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        let rows = self.send(request, "删除", collection, id).await?;
        Self::first_row(rows, collection, id)
    }

    pub async fn upsert(&self, collection: &str, row: &Row, conflict_key: &str) -> Result<Row> {
        let request = self
            .client
            .post(self.table_url(collection))
            .query(&[("on_conflict", conflict_key)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(row);
        let rows = self.send(request, "插入或更新", collection, "").await?;
        Self::first_row(rows, collection, "")
    }
}
