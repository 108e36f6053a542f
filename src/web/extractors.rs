use crate::utils::error::GatewayError;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Query, Request},
    http::{header, request::Parts, StatusCode},
    Json,
};
use serde::Deserialize;

/// Backend selection carried in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct DetectQuery {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

/// Image submitted as multipart form data or as a raw request body.
///
/// Multipart requests carry the image in an `image` or `file` part and
/// may override the query's `model` and `output` with text parts.
#[derive(Debug)]
pub struct ImageUpload {
    pub image: Bytes,
    pub model: Option<String>,
    pub output: Option<String>,
}

#[async_trait]
impl<S> FromRequest<S> for ImageUpload
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<DetectQuery>::try_from_uri(req.uri())
            .map_err(|e| GatewayError::InvalidInput(format!("Invalid query string: {}", e)))?;

        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|content_type| content_type.starts_with("multipart/form-data"))
            .unwrap_or(false);

        let mut upload = ImageUpload {
            image: Bytes::new(),
            model: query.model,
            output: query.output,
        };

        if is_multipart {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| body_error(e.status(), e.body_text()))?;
            read_multipart(&mut multipart, &mut upload).await?;
        } else {
            upload.image = Bytes::from_request(req, state)
                .await
                .map_err(|e| body_error(e.status(), e.body_text()))?;
        }

        if upload.image.is_empty() {
            return Err(GatewayError::InvalidInput("No image provided".to_string()));
        }

        Ok(upload)
    }
}

async fn read_multipart(multipart: &mut Multipart, upload: &mut ImageUpload) -> Result<(), GatewayError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| body_error(e.status(), e.body_text()))?
    {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            // Part content types are not trusted; the decoder sniffs the bytes.
            "image" | "file" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| body_error(e.status(), e.body_text()))?;
                tracing::debug!("Received image part '{}': {} bytes", field_name, data.len());
                upload.image = data;
            }
            "model" | "output" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| body_error(e.status(), e.body_text()))?;
                let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                if field_name == "model" {
                    upload.model = value.or(upload.model.take());
                } else {
                    upload.output = value.or(upload.output.take());
                }
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    Ok(())
}

fn body_error(status: StatusCode, message: String) -> GatewayError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::BodyTooLarge(message)
    } else {
        GatewayError::InvalidInput(format!("Failed to read request body: {}", message))
    }
}

/// JSON body that passes [`Validate`] before reaching the handler.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: for<'de> Deserialize<'de> + Validate,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| GatewayError::InvalidInput(format!("JSON parse error: {}", err.body_text())))?;

        value
            .validate()
            .map_err(|err| GatewayError::InvalidInput(format!("Validation error: {}", err)))?;

        Ok(ValidatedJson(value))
    }
}

pub trait Validate {
    type Error: std::fmt::Display;

    fn validate(&self) -> Result<(), Self::Error>;
}

impl Validate for crate::web::handlers::DetectJsonRequest {
    type Error = String;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.image.trim().is_empty() {
            return Err("Image data cannot be empty".to_string());
        }

        if let Some(ref model) = self.model {
            model
                .parse::<crate::detection::Backend>()
                .map_err(|e| e.to_string())?;
        }

        if let Some(ref output) = self.output {
            output
                .parse::<crate::detection::CascadeOutput>()
                .map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}

/// Request id from `X-Request-ID`, or a fresh UUID.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("X-Request-ID")
            .and_then(|value| value.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(RequestId(request_id))
    }
}
