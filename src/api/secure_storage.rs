use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::password_hash::rand_core::RngCore;
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use super::error::ApiError;

const ENCRYPTION_VERSION: u8 = 1;
pub const STORE_FILE: &str = "credentials.enc";

/// Entry name of the generative-AI key
pub const ANALYSIS_API_KEY: &str = "gemini-api-key";

#[derive(Serialize, Deserialize, Clone)]
struct EncryptedCredential {
    nonce: String,      // Base64 encoded nonce
    ciphertext: String, // Base64 encoded encrypted data
}

#[derive(Serialize, Deserialize)]
struct CredentialStore {
    version: u8,
    salt: String, // Base64 encoded salt for key derivation
    credentials: HashMap<String, EncryptedCredential>,
}

/// Encrypted credential file in the journal's data directory.
/// The key is derived from host and user names, so the file only opens on the machine that wrote it.
pub struct SecureStorage {
    store_path: PathBuf,
    master_key: [u8; 32],
}

impl SecureStorage {
    pub fn new(data_dir: &Path) -> Result<Self, ApiError> {
        Self::with_machine_id(data_dir, &machine_id())
    }

    fn with_machine_id(data_dir: &Path, machine_id: &str) -> Result<Self, ApiError> {
        let store_path = data_dir.join(STORE_FILE);

        // The salt must survive restarts or previously stored secrets become unreadable
        let store = Self::load_or_create_store(&store_path)?;
        if !store_path.exists() {
            Self::write_store(&store_path, &store)?;
        }

        let master_key = derive_key(machine_id, &store.salt)?;

        Ok(Self {
            store_path,
            master_key,
        })
    }

    fn load_or_create_store(store_path: &Path) -> Result<CredentialStore, ApiError> {
        if store_path.exists() {
            let data = fs::read(store_path)
                .map_err(|e| ApiError::EncryptionError(format!("Failed to read store: {}", e)))?;

            let store: CredentialStore = serde_json::from_slice(&data)
                .map_err(|e| ApiError::EncryptionError(format!("Failed to parse store: {}", e)))?;

            if store.version != ENCRYPTION_VERSION {
                return Err(ApiError::EncryptionError(format!(
                    "Unsupported credential store version {}",
                    store.version
                )));
            }
            Ok(store)
        } else {
            let mut salt_bytes = [0u8; 16];
            OsRng.fill_bytes(&mut salt_bytes);

            Ok(CredentialStore {
                version: ENCRYPTION_VERSION,
                salt: BASE64.encode(salt_bytes),
                credentials: HashMap::new(),
            })
        }
    }

    fn write_store(store_path: &Path, store: &CredentialStore) -> Result<(), ApiError> {
        let data = serde_json::to_vec_pretty(store)
            .map_err(|e| ApiError::EncryptionError(format!("Failed to serialize store: {}", e)))?;

        if let Some(parent) = store_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ApiError::EncryptionError(format!("Failed to create directory: {}", e)))?;
        }

        fs::write(store_path, data)
            .map_err(|e| ApiError::EncryptionError(format!("Failed to write store: {}", e)))
    }

    fn cipher(&self) -> Result<Aes256Gcm, ApiError> {
        Aes256Gcm::new_from_slice(&self.master_key)
            .map_err(|e| ApiError::EncryptionError(format!("Failed to create cipher: {}", e)))
    }

    /// Encrypt and store a credential
    pub fn store(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher.encrypt(nonce, value.as_bytes())?;

        let mut store = Self::load_or_create_store(&self.store_path)?;
        store.credentials.insert(
            key.to_string(),
            EncryptedCredential {
                nonce: BASE64.encode(nonce_bytes),
                ciphertext: BASE64.encode(&ciphertext),
            },
        );

        Self::write_store(&self.store_path, &store)?;
        log::info!("Credential '{}' stored", key);
        Ok(())
    }

    /// Decrypt a credential; `Ok(None)` when it was never stored
    pub fn retrieve(&self, key: &str) -> Result<Option<String>, ApiError> {
        let store = Self::load_or_create_store(&self.store_path)?;

        let Some(encrypted) = store.credentials.get(key) else {
            return Ok(None);
        };

        let nonce_bytes = BASE64.decode(&encrypted.nonce)
            .map_err(|e| ApiError::EncryptionError(format!("Invalid nonce: {}", e)))?;
        if nonce_bytes.len() != 12 {
            return Err(ApiError::EncryptionError("Invalid nonce length".to_string()));
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = BASE64.decode(&encrypted.ciphertext)
            .map_err(|e| ApiError::EncryptionError(format!("Invalid ciphertext: {}", e)))?;

        let plaintext = self.cipher()?.decrypt(nonce, ciphertext.as_ref())?;

        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|e| ApiError::EncryptionError(format!("Invalid UTF-8: {}", e)))
    }

    /// Returns whether the credential existed
    pub fn delete(&self, key: &str) -> Result<bool, ApiError> {
        let mut store = Self::load_or_create_store(&self.store_path)?;
        let existed = store.credentials.remove(key).is_some();
        Self::write_store(&self.store_path, &store)?;
        Ok(existed)
    }
}

fn machine_id() -> String {
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());

    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string());

    format!("fx-trade-journal-{}-{}", hostname, username)
}

fn derive_key(machine_id: &str, salt_b64: &str) -> Result<[u8; 32], ApiError> {
    let salt_bytes = BASE64.decode(salt_b64)
        .map_err(|e| ApiError::EncryptionError(format!("Invalid salt: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());

    let mut output_key = [0u8; 32]; // AES-256
    argon2
        .hash_password_into(machine_id.as_bytes(), &salt_bytes, &mut output_key)
        .map_err(|e| ApiError::EncryptionError(format!("Key derivation failed: {}", e)))?;

    Ok(output_key)
}

/// Last four characters, for status output
pub fn key_preview(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() <= 4 {
        "*".repeat(chars.len())
    } else {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****...{}", tail)
    }
}
