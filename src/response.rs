use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// Wire envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl<T: Serialize> Envelope<T> {
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

pub fn success<T: Serialize>(
    title: impl Into<String>,
    message: impl Into<String>,
    data: T,
) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        title: title.into(),
        message: message.into(),
        data: Some(data),
        meta: None,
    })
}

/// Success without a payload.
pub fn done(title: impl Into<String>, message: impl Into<String>) -> Json<Envelope<Value>> {
    Json(Envelope {
        status: "success",
        title: title.into(),
        message: message.into(),
        data: None,
        meta: None,
    })
}

pub fn failure(
    title: impl Into<String>,
    message: impl Into<String>,
    data: Option<Value>,
) -> Envelope<Value> {
    Envelope {
        status: "error",
        title: title.into(),
        message: message.into(),
        data,
        meta: None,
    }
}
