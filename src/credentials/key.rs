//! Keypair material read from credential files.

use std::fmt;

/// Length of a keypair file: 32 secret bytes followed by 32 public bytes.
pub const KEYPAIR_LEN: usize = 64;

/// Length of the public half of a keypair.
pub const PUBLIC_KEY_LEN: usize = 32;

/// A loaded keypair.
///
/// The secret half never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Credential name (file stem).
    name: String,
    /// Raw keypair bytes.
    bytes: [u8; KEYPAIR_LEN],
}

impl KeyMaterial {
    /// Parses a keypair from the JSON byte-array file format.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the content is not a JSON
    /// array of exactly 64 bytes.
    pub fn from_json(name: &str, content: &str) -> std::result::Result<Self, String> {
        let values: Vec<u8> = serde_json::from_str(content)
            .map_err(|e| format!("expected a JSON array of bytes: {e}"))?;

        let bytes: [u8; KEYPAIR_LEN] = values
            .try_into()
            .map_err(|v: Vec<u8>| format!("expected {KEYPAIR_LEN} bytes, found {}", v.len()))?;

        if bytes[KEYPAIR_LEN - PUBLIC_KEY_LEN..].iter().all(|b| *b == 0) {
            return Err(String::from("public key half is all zeroes"));
        }

        Ok(Self {
            name: name.to_string(),
            bytes,
        })
    }

    /// Creates key material from raw bytes.
    #[must_use]
    pub fn from_bytes(name: &str, bytes: [u8; KEYPAIR_LEN]) -> Self {
        Self {
            name: name.to_string(),
            bytes,
        }
    }

    /// Returns the credential name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the public key bytes.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.bytes[KEYPAIR_LEN - PUBLIC_KEY_LEN..]
    }

    /// Returns the address derived from the public key (hex encoded).
    #[must_use]
    pub fn address(&self) -> String {
        hex::encode(self.public_key())
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("name", &self.name)
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
