//! Decryption hook for encrypted documents.
//!
//! Key derivation and ciphers are left to the handler. The document only
//! decides which bytes pass through it: strings of indirect objects and
//! stream data, but never the `/Encrypt` dictionary, cross-reference
//! streams or objects stored inside object streams.

use crate::model::objects::{Dictionary, ObjectKey};

/// Supplied through [`OpenOptions::security_handler`](super::OpenOptions::security_handler).
pub trait SecurityHandler {
    /// Decrypt a string belonging to indirect object `key`.
    fn decrypt_string(&self, key: ObjectKey, data: &[u8]) -> Vec<u8>;

    /// Decrypt the raw data of stream `key`, before any filter runs.
    ///
    /// `dict` lets handlers skip streams such as unencrypted metadata.
    fn decrypt_stream(&self, key: ObjectKey, data: &[u8], dict: &Dictionary) -> Vec<u8> {
        let _ = dict;
        self.decrypt_string(key, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::objects::Value;

    struct Xor(u8);

    impl SecurityHandler for Xor {
        fn decrypt_string(&self, key: ObjectKey, data: &[u8]) -> Vec<u8> {
            let k = self.0 ^ key.number as u8;
            data.iter().map(|b| b ^ k).collect()
        }
    }

    #[test]
    fn streams_default_to_string_decryption() {
        let handler = Xor(0x20);
        let key = ObjectKey::new(1, 0);
        let plain = handler.decrypt_string(key, b"ABC");
        let mut dict = Dictionary::new();
        dict.set("Length", Value::Int(3));
        assert_eq!(handler.decrypt_stream(key, b"ABC", &dict), plain);
        assert_eq!(handler.decrypt_string(key, &plain), b"ABC");
    }
}
