//! Shared access signature tokens for device send paths

use crate::error::{ProbeError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use probe_config::service::keys::DEVICE_CONNECTION_STRING;
use probe_config::ConfigError;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

fn url_encode(input: &str) -> String {
    url::form_urlencoded::byte_serialize(input.as_bytes()).collect()
}

/// `SharedAccessSignature sr=…&sig=…&se=…` for `resource_uri`, valid until `expiry` (Unix seconds)
pub fn generate_sas_token(resource_uri: &str, key_base64: &str, expiry: i64) -> Result<String> {
    let key = STANDARD.decode(key_base64.trim()).map_err(|e| {
        ProbeError::from(ConfigError::invalid(
            DEVICE_CONNECTION_STRING,
            format!("SharedAccessKey is not base64: {e}"),
        ))
    })?;

    let encoded_uri = url_encode(resource_uri);
    let to_sign = format!("{encoded_uri}\n{expiry}");

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| ProbeError::from(ConfigError::invalid(DEVICE_CONNECTION_STRING, e.to_string())))?;
    mac.update(to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!(
        "SharedAccessSignature sr={encoded_uri}&sig={}&se={expiry}",
        url_encode(&signature)
    ))
}

/// Token valid for `ttl` from now
pub fn token_from_now(resource_uri: &str, key_base64: &str, ttl: Duration) -> Result<String> {
    let expiry = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
    generate_sas_token(resource_uri, key_base64, expiry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_token() {
        let token = generate_sas_token(
            "hub.azure-devices.net/devices/dev1",
            "ZGV2aWNlLXNlY3JldC1rZXk=",
            1_700_003_600,
        )
        .unwrap();
        assert_eq!(
            token,
            "SharedAccessSignature sr=hub.azure-devices.net%2Fdevices%2Fdev1\
             &sig=wB8A34OYH%2FZMaEg%2Be1QKwnG4zw%2BTHknn0uAu5c%2FOgIQ%3D&se=1700003600"
        );
    }

    #[test]
    fn test_invalid_key_rejected() {
        let err = generate_sas_token("h/devices/d", "not base64!", 1).unwrap_err();
        assert!(matches!(err, ProbeError::ConfigurationInvalid(_)));
    }

    #[test]
    fn test_token_from_now_expires_in_future() {
        let token = token_from_now("h/devices/d", "a2V5", Duration::from_secs(60)).unwrap();
        let expiry: i64 = token.rsplit("se=").next().unwrap().parse().unwrap();
        assert!(expiry > chrono::Utc::now().timestamp());
    }
}
