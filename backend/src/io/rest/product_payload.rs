//! Extractor for product bodies sent either as JSON or as a multipart form.
//!
//! Form fields carry the same names as the JSON body. The optional `image`
//! part is split off as an [`UploadedImage`]; every other part is read as
//! text and deserialized into the request type.

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::error::ApiError;
use crate::domain::models::upload::UploadedImage;

const IMAGE_FIELD: &str = "image";

pub struct ProductPayload<T> {
    pub request: T,
    pub image: Option<UploadedImage>,
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
}

#[axum::async_trait]
impl<S, T> FromRequest<S> for ProductPayload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Json(request) = Json::<T>::from_request(req, state).await?;
            return Ok(Self { request, image: None });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        let mut fields = Map::new();
        let mut image = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if name == IMAGE_FIELD {
                let file_name = field.file_name().unwrap_or(IMAGE_FIELD).to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;

                // browsers send an empty part when no file was picked
                if bytes.is_empty() {
                    continue;
                }

                debug!("Received image part {} ({} bytes)", file_name, bytes.len());
                image = Some(UploadedImage {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else if !name.is_empty() {
                let text = field.text().await?;
                fields.insert(name, Value::String(text));
            }
        }

        let request = serde_json::from_value(Value::Object(fields))
            .map_err(|e| ApiError::BadRequest(format!("Invalid form data: {}", e)))?;

        Ok(Self { request, image })
    }
}
