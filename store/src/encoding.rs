//! Transport codec for landing payloads.
//!
//! Payloads pass through the ingress boundary base64-encoded so arbitrary
//! bytes survive transports that are only 7-bit safe. The codec is applied
//! by the gateway before the landing write and reversed by the workers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::Deserialize;

#[derive(thiserror::Error, Debug)]
pub enum EncodingError {
    #[error("malformed base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Wire encoding applied to stored landing payloads.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportEncoding {
    /// Bytes stored as received.
    Identity,
    #[default]
    Base64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TransportCodec {
    encoding: TransportEncoding,
}

impl TransportCodec {
    pub fn new(encoding: TransportEncoding) -> Self {
        TransportCodec { encoding }
    }

    pub fn encode(&self, raw: &[u8]) -> Bytes {
        match self.encoding {
            TransportEncoding::Identity => Bytes::copy_from_slice(raw),
            TransportEncoding::Base64 => Bytes::from(STANDARD.encode(raw).into_bytes()),
        }
    }

    pub fn decode(&self, stored: &[u8]) -> Result<Bytes, EncodingError> {
        match self.encoding {
            TransportEncoding::Identity => Ok(Bytes::copy_from_slice(stored)),
            TransportEncoding::Base64 => Ok(Bytes::from(STANDARD.decode(stored)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_round_trip() {
        let codec = TransportCodec::new(TransportEncoding::Base64);
        let raw = br#"{"key1":"value1"}"#;

        let encoded = codec.encode(raw);
        assert_ne!(encoded.as_ref(), raw.as_slice());

        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.as_ref(), raw.as_slice());
    }

    #[test]
    fn identity_passes_bytes_through() {
        let codec = TransportCodec::new(TransportEncoding::Identity);
        let raw = [0u8, 159, 146, 150];

        let encoded = codec.encode(&raw);
        assert_eq!(encoded.as_ref(), raw.as_slice());
        assert_eq!(codec.decode(&encoded).unwrap().as_ref(), raw.as_slice());
    }

    #[test]
    fn malformed_base64_is_rejected() {
        let codec = TransportCodec::new(TransportEncoding::Base64);
        let err = codec.decode(b"!!! not base64 !!!").unwrap_err();
        assert!(matches!(err, EncodingError::Base64(_)));
    }

    #[test]
    fn encoding_deserializes_from_config() {
        assert_eq!(
            serde_yaml::from_str::<TransportEncoding>("base64").unwrap(),
            TransportEncoding::Base64
        );
        assert_eq!(
            serde_yaml::from_str::<TransportEncoding>("identity").unwrap(),
            TransportEncoding::Identity
        );
        assert!(serde_yaml::from_str::<TransportEncoding>("gzip").is_err());
    }
}
