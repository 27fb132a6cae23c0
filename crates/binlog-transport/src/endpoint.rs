//! Endpoint - dialling remote services

use crate::error::{Error, Result};
use tonic::transport::{Channel, Endpoint};

/// `host:port` targets are taken as plaintext HTTP/2
pub(crate) fn endpoint_uri(target: &str) -> String {
    if target.contains("://") {
        target.to_string()
    } else {
        format!("http://{target}")
    }
}

pub(crate) async fn connect(target: &str) -> Result<Channel> {
    let connect_error = |source| Error::Connect {
        target: target.to_string(),
        source,
    };
    Endpoint::from_shared(endpoint_uri(target))
        .map_err(connect_error)?
        .connect()
        .await
        .map_err(connect_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uri() {
        assert_eq!(endpoint_uri("localhost:50051"), "http://localhost:50051");
        assert_eq!(endpoint_uri("https://sink.example:443"), "https://sink.example:443");
    }
}
