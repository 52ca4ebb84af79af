//! Request extractors

use super::response::ApiError;
use crate::auth::AuthenticatedUser;
use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use std::convert::Infallible;
use std::net::SocketAddr;

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Caller address and user agent, recorded on audit entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client IP, from proxy headers or the socket
    pub ip_address: Option<String>,
    /// `User-Agent` header
    pub user_agent: Option<String>,
}

impl ClientInfo {
    fn from_parts(parts: &Parts) -> Self {
        let ip_address = forwarded_ip(&parts.headers).or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            ip_address,
            user_agent,
        }
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_user_extractor_requires_extension() {
        let mut p = parts(Request::builder());
        let err = AuthenticatedUser::from_request_parts(&mut p, &())
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);

        p.extensions.insert(AuthenticatedUser {
            user_id: "u1".to_string(),
            email: String::new(),
            display_name: String::new(),
            role: "user".to_string(),
        });
        let user = AuthenticatedUser::from_request_parts(&mut p, &())
            .await
            .unwrap();
        assert_eq!(user.user_id, "u1");
    }

    #[test]
    fn test_client_info_prefers_forwarded_for() {
        let p = parts(
            Request::builder()
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                .header("x-real-ip", "10.0.0.2")
                .header("user-agent", "link-ios/3.1"),
        );
        let info = ClientInfo::from_parts(&p);
        assert_eq!(info.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(info.user_agent.as_deref(), Some("link-ios/3.1"));
    }

    #[test]
    fn test_client_info_falls_back_to_real_ip_then_socket() {
        let p = parts(Request::builder().header("x-real-ip", "10.0.0.2"));
        assert_eq!(
            ClientInfo::from_parts(&p).ip_address.as_deref(),
            Some("10.0.0.2")
        );

        let mut p = parts(Request::builder());
        p.extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(
            ClientInfo::from_parts(&p).ip_address.as_deref(),
            Some("192.0.2.1")
        );
    }

    #[test]
    fn test_client_info_empty() {
        let p = parts(Request::builder());
        assert_eq!(ClientInfo::from_parts(&p), ClientInfo::default());
    }
}
