//! Stream endpoint construction.
//!
//! An [`EndpointFactory`] is derived once from the configured server
//! address and then stamps out one [`Endpoint`] per connection attempt,
//! attaching the camera id and the bearer token.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Path of the stream service when none is configured.
pub const DEFAULT_STREAM_PATH: &str = "/stream";

const CAMERA_PARAM: &str = "cameraId";
const TOKEN_PARAM: &str = "access_token";

/// Where the bearer token travels on the upgrade request.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CredentialPlacement {
    /// `?access_token=<token>` on the stream URL.
    #[default]
    Query,
    /// `Authorization: Bearer <token>` header.
    Header,
}

/// Builds per-camera stream endpoints from a base server address.
#[derive(Debug, Clone)]
pub struct EndpointFactory {
    base: Url,
    path: String,
    placement: CredentialPlacement,
}

impl EndpointFactory {
    /// Create a factory for `base`, translating `http(s)` to `ws(s)`.
    ///
    /// Any path or query on `base` is replaced by `path` when endpoints
    /// are built.
    pub fn new(
        base: &Url,
        path: impl Into<String>,
        placement: CredentialPlacement,
    ) -> Result<Self, Error> {
        let scheme = match base.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(Error::UnsupportedScheme {
                    scheme: other.to_owned(),
                });
            }
        };
        if base.host_str().is_none() {
            return Err(Error::InvalidEndpoint {
                message: format!("'{base}' has no host"),
            });
        }

        let mut base = base.clone();
        base.set_scheme(scheme).map_err(|()| Error::InvalidEndpoint {
            message: format!("cannot use scheme '{scheme}' with '{base}'"),
        })?;

        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }

        Ok(Self {
            base,
            path,
            placement,
        })
    }

    /// Parse `base` and create a factory for it.
    pub fn parse(
        base: &str,
        path: impl Into<String>,
        placement: CredentialPlacement,
    ) -> Result<Self, Error> {
        Self::new(&Url::parse(base)?, path, placement)
    }

    pub fn placement(&self) -> CredentialPlacement {
        self.placement
    }

    /// Endpoint for one connection attempt to `camera_id`.
    pub fn build(&self, camera_id: &str, token: &SecretString) -> Endpoint {
        let mut url = self.base.clone();
        url.set_path(&self.path);
        url.set_query(None);
        url.set_fragment(None);
        url.query_pairs_mut().append_pair(CAMERA_PARAM, camera_id);

        Endpoint {
            url,
            camera_id: camera_id.to_owned(),
            token: token.clone(),
            placement: self.placement,
        }
    }
}

/// A fully-resolved stream address for one camera.
///
/// `Display` and [`Endpoint::url`] never include the token.
#[derive(Debug, Clone)]
pub struct Endpoint {
    url: Url,
    camera_id: String,
    token: SecretString,
    placement: CredentialPlacement,
}

impl Endpoint {
    /// Stream URL without credentials.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn placement(&self) -> CredentialPlacement {
        self.placement
    }

    /// URL to dial. Carries the token when placement is [`CredentialPlacement::Query`].
    pub fn connect_url(&self) -> Url {
        let mut url = self.url.clone();
        if self.placement == CredentialPlacement::Query {
            url.query_pairs_mut()
                .append_pair(TOKEN_PARAM, self.token.expose_secret());
        }
        url
    }

    /// `Authorization` header value, when placement is [`CredentialPlacement::Header`].
    pub fn authorization(&self) -> Option<String> {
        (self.placement == CredentialPlacement::Header)
            .then(|| format!("Bearer {}", self.token.expose_secret()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn token() -> SecretString {
        SecretString::from("s3cret".to_owned())
    }

    #[test]
    fn http_base_maps_to_ws() {
        let factory =
            EndpointFactory::parse("http://nvr.local:8080", "/stream", CredentialPlacement::Query)
                .unwrap();
        let endpoint = factory.build("b1-f1-c2", &token());
        assert_eq!(
            endpoint.url().as_str(),
            "ws://nvr.local:8080/stream?cameraId=b1-f1-c2"
        );
        assert_eq!(
            endpoint.connect_url().as_str(),
            "ws://nvr.local:8080/stream?cameraId=b1-f1-c2&access_token=s3cret"
        );
        assert!(endpoint.authorization().is_none());
    }

    #[test]
    fn https_base_maps_to_wss_and_replaces_path() {
        let factory = EndpointFactory::parse(
            "https://cams.example.com/app/?x=1",
            "api/stream/ws",
            CredentialPlacement::Header,
        )
        .unwrap();
        let endpoint = factory.build("c 1", &token());
        assert_eq!(
            endpoint.connect_url().as_str(),
            "wss://cams.example.com/api/stream/ws?cameraId=c+1"
        );
        assert_eq!(endpoint.authorization().as_deref(), Some("Bearer s3cret"));
    }

    #[test]
    fn display_never_contains_token() {
        let factory =
            EndpointFactory::parse("ws://localhost", DEFAULT_STREAM_PATH, CredentialPlacement::Query)
                .unwrap();
        let endpoint = factory.build("c1", &token());
        assert!(!endpoint.to_string().contains("s3cret"));
        assert!(!format!("{endpoint:?}").contains("s3cret"));
    }

    #[test]
    fn rejects_non_web_schemes() {
        let err = EndpointFactory::parse("ftp://host", "/stream", CredentialPlacement::Query)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme { ref scheme } if scheme == "ftp"));
    }

    #[test]
    fn placement_parses_from_config_strings() {
        assert_eq!(
            "header".parse::<CredentialPlacement>().unwrap(),
            CredentialPlacement::Header
        );
        assert_eq!(CredentialPlacement::default().to_string(), "query");
    }
}
