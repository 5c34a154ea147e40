//! Synthesized responses for when both the cache and the network fail.

use swcache_core::Response;

/// Placeholder served for images that are neither cached nor reachable.
pub const IMAGE_PLACEHOLDER_SVG: &str = r##"<svg width="400" height="300" xmlns="http://www.w3.org/2000/svg"><rect width="100%" height="100%" fill="#f0f0f0"/><text x="50%" y="50%" text-anchor="middle" dy=".3em" fill="#999">Imagem não disponível</text></svg>"##;

/// Body of the 503 served by cache-first requests.
pub const OFFLINE_UNAVAILABLE: &str = "Recurso não disponível offline";

/// Body of the 503 served by network-first and stale-while-revalidate requests.
pub const UNAVAILABLE: &str = "Recurso não disponível";

pub fn image_placeholder() -> Response {
    Response::new(200, IMAGE_PLACEHOLDER_SVG).with_header("content-type", "image/svg+xml")
}

/// 503 with a plain-text explanation.
pub fn unavailable(message: &'static str) -> Response {
    Response::new(503, message).with_header("content-type", "text/plain; charset=utf-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_placeholder() {
        let response = image_placeholder();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("image/svg+xml"));
        assert!(response.text().unwrap().contains("Imagem não disponível"));
    }

    #[test]
    fn test_unavailable() {
        let response = unavailable(OFFLINE_UNAVAILABLE);
        assert_eq!(response.status, 503);
        assert_eq!(response.text(), Some("Recurso não disponível offline"));
        assert!(response.content_type().unwrap().starts_with("text/plain"));
    }
}
