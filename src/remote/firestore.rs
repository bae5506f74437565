//! Firestore REST v1 client.
//!
//! Only the calls the service needs: a structured query per collection,
//! document create, masked patch and delete. Values travel in Firestore's
//! typed envelope (`{"stringValue": "..."}`) and are flattened to plain JSON
//! on the way in.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use std::time::Duration;

use super::{check_response, Fields, RemoteDocument, RemoteError, RemoteStore, TENANT_FIELD};
use crate::{config::RemoteConfig, model::EntityKind};

#[derive(Debug, Clone)]
enum Auth {
    ApiKey(String),
    Bearer(String),
}

pub struct FirestoreStore {
    http: reqwest::Client,
    documents_url: String,
    auth: Auth,
}

#[derive(Deserialize)]
struct QueryRow {
    document: Option<RawDocument>,
}

#[derive(Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let auth = match (&config.bearer_token, &config.api_key) {
            (Some(token), _) if !token.trim().is_empty() => Auth::Bearer(token.clone()),
            (_, Some(key)) if !key.trim().is_empty() => Auth::ApiKey(key.clone()),
            _ => {
                return Err(RemoteError::Unavailable(
                    "firestore needs an api_key or a bearer_token".to_string(),
                ))
            }
        };
        if config.project_id.trim().is_empty() {
            return Err(RemoteError::Unavailable(
                "firestore project_id is not set".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("stablebook/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        let documents_url = format!(
            "{}/projects/{}/databases/{}/documents",
            config.base_url.trim_end_matches('/'),
            config.project_id.trim(),
            config.database.trim(),
        );
        Ok(Self {
            http,
            documents_url,
            auth,
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::ApiKey(key) => req.query(&[("key", key.as_str())]),
            Auth::Bearer(token) => req.bearer_auth(token),
        }
    }

    fn document_url(&self, kind: EntityKind, id: &str) -> String {
        format!("{}/{}/{}", self.documents_url, kind.collection(), id)
    }
}

#[async_trait]
impl RemoteStore for FirestoreStore {
    fn backend(&self) -> &'static str {
        "firestore"
    }

    async fn list(
        &self,
        kind: EntityKind,
        tenant: Option<&str>,
    ) -> Result<Vec<RemoteDocument>, RemoteError> {
        let url = format!("{}:runQuery", self.documents_url);
        let body = structured_query(kind, tenant);
        let resp = self
            .authorize(self.http.post(&url))
            .json(&body)
            .send()
            .await?;
        let rows: Vec<QueryRow> = check_response(resp).await?.json().await?;
        rows.into_iter()
            .filter_map(|row| row.document)
            .map(|doc| {
                Ok(RemoteDocument {
                    id: document_id(&doc.name)?,
                    fields: decode_fields(doc.fields),
                })
            })
            .collect()
    }

    async fn create(&self, kind: EntityKind, fields: Fields) -> Result<String, RemoteError> {
        let url = format!("{}/{}", self.documents_url, kind.collection());
        let resp = self
            .authorize(self.http.post(&url))
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;
        let doc: RawDocument = check_response(resp).await?.json().await?;
        document_id(&doc.name)
    }

    async fn update(&self, kind: EntityKind, id: &str, fields: Fields) -> Result<(), RemoteError> {
        let mask: Vec<(&str, &str)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", k.as_str()))
            .collect();
        let resp = self
            .authorize(self.http.patch(self.document_url(kind, id)))
            .query(&mask)
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;
        check_response(resp).await?;
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), RemoteError> {
        let resp = self
            .authorize(self.http.delete(self.document_url(kind, id)))
            .send()
            .await?;
        check_response(resp).await?;
        Ok(())
    }
}

fn structured_query(kind: EntityKind, tenant: Option<&str>) -> Value {
    let mut query = json!({
        "from": [{ "collectionId": kind.collection() }],
    });
    if let Some(tenant) = tenant {
        query["where"] = json!({
            "fieldFilter": {
                "field": { "fieldPath": TENANT_FIELD },
                "op": "EQUAL",
                "value": { "stringValue": tenant },
            }
        });
    }
    json!({ "structuredQuery": query })
}

/// Last path segment of `projects/p/databases/d/documents/<collection>/<id>`.
fn document_id(name: &str) -> Result<String, RemoteError> {
    match name.rsplit_once('/') {
        Some((_, id)) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(RemoteError::Parse(format!(
            "unexpected document name '{name}'"
        ))),
    }
}

pub(crate) fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

pub(crate) fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub(crate) fn decode_fields(fields: Map<String, Value>) -> Fields {
    fields
        .into_iter()
        .map(|(k, v)| (k, decode_value(v)))
        .collect()
}

pub(crate) fn decode_value(value: Value) -> Value {
    let Value::Object(mut envelope) = value else {
        return value;
    };
    if let Some(v) = envelope.remove("stringValue") {
        return v;
    }
    if let Some(v) = envelope.remove("integerValue") {
        return match &v {
            Value::String(s) => s
                .parse::<i64>()
                .map(|i| Value::Number(Number::from(i)))
                .unwrap_or(v),
            _ => v,
        };
    }
    if let Some(v) = envelope.remove("doubleValue") {
        return v;
    }
    if let Some(v) = envelope.remove("booleanValue") {
        return v;
    }
    if envelope.contains_key("nullValue") {
        return Value::Null;
    }
    if let Some(v) = envelope
        .remove("timestampValue")
        .or_else(|| envelope.remove("referenceValue"))
    {
        return v;
    }
    if let Some(Value::Object(mut arr)) = envelope.remove("arrayValue") {
        return match arr.remove("values") {
            Some(Value::Array(items)) => Value::Array(items.into_iter().map(decode_value).collect()),
            _ => Value::Array(Vec::new()),
        };
    }
    if let Some(Value::Object(mut map)) = envelope.remove("mapValue") {
        return match map.remove("fields") {
            Some(Value::Object(fields)) => Value::Object(decode_fields(fields)),
            _ => Value::Object(Map::new()),
        };
    }
    Value::Object(envelope)
}
