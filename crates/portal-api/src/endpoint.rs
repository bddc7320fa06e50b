//! Derives the portal WebSocket endpoint from the address the portal page
//! was served from.

use url::Url;

use crate::error::Error;

/// Port the portal WebSocket server listens on.
pub const DEFAULT_PORT: u16 = 8810;

/// Host used when the origin carries none. This is the soft-AP address
/// the device hands out while unprovisioned.
pub const FALLBACK_HOST: &str = "192.168.4.1";

/// Resolve the WebSocket endpoint for a portal origin.
///
/// `https` origins map to `wss`, everything else to `ws`. The origin's host
/// is kept. An explicit non-default port on the origin is kept as well;
/// otherwise [`DEFAULT_PORT`] is used. Bare hosts such as `192.168.4.1` or
/// `portal.local:80` are accepted and treated as `http`.
pub fn endpoint_for_origin(origin: &str) -> Result<Url, Error> {
    let origin = origin.trim();
    let parsed = if origin.contains("://") {
        Url::parse(origin)?
    } else if origin.is_empty() {
        Url::parse(&format!("http://{FALLBACK_HOST}"))?
    } else {
        Url::parse(&format!("http://{origin}"))?
    };

    let scheme = match parsed.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(Error::InvalidOrigin {
                origin: origin.to_owned(),
                reason: format!("unsupported scheme `{other}`"),
            });
        }
    };

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .unwrap_or(FALLBACK_HOST);

    // `port()` is `None` when the origin uses its scheme's default port.
    let port = parsed.port().unwrap_or(DEFAULT_PORT);

    Ok(Url::parse(&format!("{scheme}://{host}:{port}/"))?)
}

/// Endpoint used when nothing at all is configured.
pub fn fallback_endpoint() -> Result<Url, Error> {
    endpoint_for_origin(FALLBACK_HOST)
}
