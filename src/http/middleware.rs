//! Payment header extraction

use axum::{extract::Request, middleware::Next, response::Response};

/// Header carrying a base64 payment receipt
pub const PAYMENT_HEADER: &str = "x-payment";

/// Raw payment receipt attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentProof(pub String);

/// Extract the payment header, if present
pub fn payment_proof(request: &Request) -> Option<PaymentProof> {
    request
        .headers()
        .get(PAYMENT_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| PaymentProof(v.to_string()))
}

/// Middleware that moves the payment header into request extensions
pub async fn capture_payment(mut request: Request, next: Next) -> Response {
    if let Some(proof) = payment_proof(&request) {
        request.extensions_mut().insert(proof);
    }
    next.run(request).await
}
