use axum::body::HttpBody;
use axum::extract::{FromRequest, Json};
use axum::http::Request;
use axum::BoxError;
use serde::de::DeserializeOwned;

use crate::errors::RequestError;

/// `Json<T>` whose rejections (bad syntax, wrong content type, type mismatches)
/// come back as a 400 in the API's error shape.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, B, T> FromRequest<S, B> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = RequestError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "rejected request body");
                Err(RequestError::BadRequest(rejection.to_string()))
            }
        }
    }
}

/// Primary keys arrive as raw path segments; anything that is not an integer names nothing.
pub fn parse_pk(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}
