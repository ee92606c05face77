use axum::extract::connect_info::ConnectInfo;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderName;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

use crate::http::AppError;

const DEVICE_ID_HEADER: HeaderName = HeaderName::from_static("x-device-id");
const FORWARDED_FOR_HEADER: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Best-effort caller identity for vote deduplication. A client-supplied
/// device token wins; otherwise the apparent network origin is used, which
/// means callers behind one NAT share an identity. That is an accepted
/// approximation, not authentication.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub token: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let device_id = parts
            .headers
            .get(DEVICE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(device_id) = device_id {
            return Ok(ClientIdentity {
                token: hash_identity("device", device_id),
            });
        }

        let forwarded = parts
            .headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(first_forwarded_entry);
        if let Some(origin) = forwarded {
            return Ok(ClientIdentity {
                token: hash_identity("ip", &origin),
            });
        }

        let ConnectInfo(addr) = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .cloned()
            .ok_or_else(|| AppError::internal("client address unavailable"))?;

        Ok(ClientIdentity {
            token: hash_identity("ip", &addr.ip().to_string()),
        })
    }
}

fn first_forwarded_entry(value: &str) -> Option<String> {
    value
        .split(',')
        .next()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
}

fn hash_identity(scope: &str, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}
