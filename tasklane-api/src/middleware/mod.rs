/// Middleware modules for the API server
///
/// - Client identity (IP and request id)
/// - Per-IP rate limiting
/// - Security headers

pub mod client_info;
pub mod rate_limit;
pub mod security;
