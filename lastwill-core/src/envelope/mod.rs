//! Authenticated symmetric encryption of vault contents.

pub mod cipher;
pub mod codec;
pub mod key;

pub use cipher::{decrypt, encrypt, Algorithm, EncryptOptions, EncryptedEnvelope, IV_LEN, TAG_LEN};
pub use codec::{decrypt_file, decrypt_object, encrypt_file, encrypt_object};
pub use key::{MasterKey, KEY_LEN};
