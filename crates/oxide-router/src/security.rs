//! Headers added to every response before any handler runs.

use crate::options::ServerOptions;
use crate::response::Response;

/// Returns `response` with the standard security headers, the CORS headers
/// when enabled, and the request id.
pub fn secure_headers(response: Response, options: &ServerOptions, request_id: &str) -> Response {
    let response = response
        .header("X-Content-Type-Options", "nosniff")
        .header("X-Frame-Options", "DENY")
        .header("X-XSS-Protection", "1; mode=block")
        .header(
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains",
        )
        .header("X-Request-ID", request_id);

    if !options.cors {
        return response;
    }

    response
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET,POST,PUT,DELETE,PATCH,OPTIONS",
        )
        .header("Access-Control-Allow-Headers", "Content-Type,Authorization")
}
