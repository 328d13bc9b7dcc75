//! Credential loading.
//!
//! Keypair files are read once per run and stay read-only afterwards.

mod key;
mod loader;

pub use key::{KEYPAIR_LEN, KeyMaterial, PUBLIC_KEY_LEN};
pub use loader::{
    Credentials, MINT, PAYER, credential_path, is_valid_credential_name, load_credentials,
};
