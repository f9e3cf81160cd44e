//! Secure Settings Storage
//!
//! Encrypted file-based credential store. API keys are sealed with
//! AES-256-GCM; the key lives next to the settings file with 0600
//! permissions on Unix.

use super::{CredentialResolver, Tier, TierCredential, TierKeyConfig, UserSettings};
use crate::config::TierProfiles;
use crate::types::{GatewayError, GatewayResult};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    AeadCore, Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::PathBuf;
use std::path::Path;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const SETTINGS_FILE: &str = "settings.json";
const ENCRYPTION_KEY_FILE: &str = ".settings_key";
const NONCE_SIZE: usize = 12;

/// Settings storage manager
///
/// All writes go through `write_lock`, so key creation and every
/// load-modify-save cycle are serialized within the process.
pub struct SettingsStorage {
    settings_path: PathBuf,
    key_path: PathBuf,
    profiles: TierProfiles,
    write_lock: Mutex<()>,
}

impl SettingsStorage {
    /// Storage in the platform data directory
    pub fn new(profiles: TierProfiles) -> Self {
        Self::with_path(Self::default_dir(), profiles)
    }

    /// Storage rooted at `base_dir` (Docker volumes, tests)
    pub fn with_path(base_dir: PathBuf, profiles: TierProfiles) -> Self {
        Self {
            settings_path: base_dir.join(SETTINGS_FILE),
            key_path: base_dir.join(ENCRYPTION_KEY_FILE),
            profiles,
            write_lock: Mutex::new(()),
        }
    }

    pub fn profiles(&self) -> &TierProfiles {
        &self.profiles
    }

    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ideaforge")
    }

    async fn ensure_dir(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Get or create the encryption key
    async fn get_or_create_key(&self) -> anyhow::Result<[u8; 32]> {
        self.ensure_dir().await?;

        if fs::try_exists(&self.key_path).await? {
            let key_data = fs::read(&self.key_path).await?;
            let key_bytes = BASE64.decode(&key_data)?;
            if key_bytes.len() == 32 {
                let mut key = [0u8; 32];
                key.copy_from_slice(&key_bytes);
                return Ok(key);
            }
            warn!("Settings encryption key has the wrong length, generating a new one");
        }

        let key: [u8; 32] = rand::random();
        write_atomic(&self.key_path, BASE64.encode(key).as_bytes(), true).await?;

        info!("Generated new encryption key for settings");
        Ok(key)
    }

    fn encrypt(&self, plaintext: &str, key: &[u8; 32]) -> anyhow::Result<String> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| anyhow::anyhow!("Invalid encryption key: {}", e))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        // nonce || ciphertext
        let mut combined = nonce.to_vec();
        combined.extend(ciphertext);
        Ok(BASE64.encode(&combined))
    }

    fn decrypt(&self, encrypted: &str, key: &[u8; 32]) -> anyhow::Result<String> {
        let combined = BASE64.decode(encrypted)?;
        if combined.len() < NONCE_SIZE {
            return Err(anyhow::anyhow!("Invalid encrypted data"));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| anyhow::anyhow!("Invalid encryption key: {}", e))?;
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("Decryption failed: {}", e))?;

        String::from_utf8(plaintext).map_err(Into::into)
    }

    /// Load settings from disk. A missing file means nothing is provisioned.
    pub async fn load(&self) -> anyhow::Result<UserSettings> {
        let _guard = self.write_lock.lock().await;
        self.load_unlocked().await
    }

    async fn load_unlocked(&self) -> anyhow::Result<UserSettings> {
        if !fs::try_exists(&self.settings_path).await? {
            debug!("No settings file found, using defaults");
            return Ok(UserSettings::default());
        }

        let key = self.get_or_create_key().await?;
        let content = fs::read_to_string(&self.settings_path).await?;
        let mut settings: UserSettings = serde_json::from_str(&content)?;

        settings.primary_key = self.decrypt_key(settings.primary_key.take(), &key);
        for tier in Tier::ALL {
            let cfg = settings.tier_mut(tier);
            cfg.api_key = self.decrypt_key(cfg.api_key.take(), &key);
        }

        debug!(path = ?self.settings_path, "Loaded settings");
        Ok(settings)
    }

    /// Save settings to disk, replacing whatever is there
    pub async fn save(&self, settings: &UserSettings) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save_unlocked(settings).await
    }

    /// Load, modify and save as one step. Returns the saved settings.
    pub async fn update<F>(&self, apply: F) -> anyhow::Result<UserSettings>
    where
        F: FnOnce(&mut UserSettings),
    {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.load_unlocked().await?;
        apply(&mut settings);
        self.save_unlocked(&settings).await?;
        Ok(settings)
    }

    async fn save_unlocked(&self, settings: &UserSettings) -> anyhow::Result<()> {
        self.ensure_dir().await?;
        let key = self.get_or_create_key().await?;

        let mut encrypted = settings.clone();
        encrypted.primary_key = self.encrypt_key(encrypted.primary_key.take(), &key)?;
        for tier in Tier::ALL {
            let cfg: &mut TierKeyConfig = encrypted.tier_mut(tier);
            cfg.api_key = self.encrypt_key(cfg.api_key.take(), &key)?;
        }

        let content = serde_json::to_string_pretty(&encrypted)?;
        write_atomic(&self.settings_path, content.as_bytes(), false).await?;

        info!(path = ?self.settings_path, "Saved settings");
        Ok(())
    }

    fn encrypt_key(&self, api_key: Option<String>, key: &[u8; 32]) -> anyhow::Result<Option<String>> {
        match api_key {
            Some(k) if !k.is_empty() => Ok(Some(self.encrypt(&k, key)?)),
            _ => Ok(None),
        }
    }

    fn decrypt_key(&self, encrypted: Option<String>, key: &[u8; 32]) -> Option<String> {
        let encrypted = encrypted.filter(|k| !k.is_empty())?;
        match self.decrypt(&encrypted, key) {
            Ok(decrypted) => Some(decrypted),
            Err(e) => {
                warn!("Failed to decrypt API key, it may be corrupted: {}", e);
                None
            }
        }
    }

    pub async fn set_tier_key(&self, tier: Tier, api_key: &str) -> anyhow::Result<()> {
        let api_key = api_key.trim().to_string();
        self.update(|s| s.tier_mut(tier).api_key = Some(api_key)).await?;
        Ok(())
    }

    pub async fn set_primary_key(&self, api_key: &str) -> anyhow::Result<()> {
        let api_key = api_key.trim().to_string();
        self.update(|s| s.primary_key = Some(api_key)).await?;
        Ok(())
    }

    pub async fn set_current_tier(&self, tier: Tier) -> anyhow::Result<()> {
        self.update(|s| s.current_tier = tier).await?;
        Ok(())
    }

    pub async fn clear_keys(&self) -> anyhow::Result<()> {
        self.update(UserSettings::clear_keys).await?;
        Ok(())
    }

    pub async fn has_any_key(&self) -> bool {
        match self.load().await {
            Ok(settings) => settings.has_any_key(),
            Err(e) => {
                error!("Failed to load settings: {}", e);
                false
            }
        }
    }

    fn credential_from(&self, settings: &UserSettings, tier: Tier) -> GatewayResult<TierCredential> {
        let api_key = settings
            .key_for(tier)
            .ok_or(GatewayError::MissingCredential)?;
        let profile = self.profiles.get(tier);
        let model_identifier = settings
            .tier(tier)
            .model
            .clone()
            .unwrap_or_else(|| profile.model.clone());

        Ok(TierCredential {
            tier,
            api_key: api_key.to_string(),
            model_identifier,
            token_limit: profile.token_limit,
        })
    }
}

/// Write to a sibling temp file, then rename it over `path`.
async fn write_atomic(path: &Path, contents: &[u8], private: bool) -> anyhow::Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, contents).await?;

    #[cfg(unix)]
    {
        if private {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&tmp_path, perms).await?;
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[async_trait]
impl CredentialResolver for SettingsStorage {
    async fn resolve_credential(&self, tier: Tier) -> GatewayResult<TierCredential> {
        let settings = self.load().await.map_err(|e| {
            error!(%tier, "Failed to load credential store: {}", e);
            GatewayError::MissingCredential
        })?;

        let credential = self.credential_from(&settings, tier);
        if credential.is_err() {
            warn!(%tier, "No API key provisioned for tier");
        }
        credential
    }

    async fn current_tier(&self) -> Tier {
        match self.load().await {
            Ok(settings) => settings.current_tier,
            Err(e) => {
                error!("Failed to load settings, assuming free tier: {}", e);
                Tier::Free
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> SettingsStorage {
        SettingsStorage::with_path(dir.path().to_path_buf(), TierProfiles::default())
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        let mut settings = UserSettings::default();
        settings.primary_key = Some("sk-or-v1-primary".to_string());
        settings.pro.api_key = Some("sk-or-v1-pro".to_string());
        settings.current_tier = Tier::Pro;

        storage.save(&settings).await.unwrap();
        let loaded = storage.load().await.unwrap();

        assert_eq!(loaded.primary_key.as_deref(), Some("sk-or-v1-primary"));
        assert_eq!(loaded.pro.api_key.as_deref(), Some("sk-or-v1-pro"));
        assert_eq!(loaded.current_tier, Tier::Pro);

        // Keys are not stored in plaintext
        let on_disk = std::fs::read_to_string(temp_dir.path().join(SETTINGS_FILE)).unwrap();
        assert!(!on_disk.contains("sk-or-v1-pro"));
    }

    #[tokio::test]
    async fn test_encryption() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        let key = storage.get_or_create_key().await.unwrap();
        let plaintext = "secret-api-key-12345";

        let encrypted = storage.encrypt(plaintext, &key).unwrap();
        assert_ne!(encrypted, plaintext);
        assert_eq!(storage.decrypt(&encrypted, &key).unwrap(), plaintext);
    }

    #[tokio::test]
    async fn test_fails_closed_when_nothing_provisioned() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        for tier in Tier::ALL {
            assert_eq!(
                storage.resolve_credential(tier).await,
                Err(GatewayError::MissingCredential)
            );
        }
        assert_eq!(storage.current_tier().await, Tier::Free);
        assert!(!storage.has_any_key().await);
    }

    #[tokio::test]
    async fn test_resolves_tier_profile() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        storage.set_primary_key("sk-primary").await.unwrap();
        storage.set_tier_key(Tier::Ultra, "sk-ultra").await.unwrap();

        let free = storage.resolve_credential(Tier::Free).await.unwrap();
        assert_eq!(free.api_key, "sk-primary");
        assert_eq!(free.model_identifier, "tngtech/deepseek-r1t2-chimera:free");
        assert_eq!(free.token_limit, 5000);

        let ultra = storage.resolve_credential(Tier::Ultra).await.unwrap();
        assert_eq!(ultra.api_key, "sk-ultra");
        assert_eq!(ultra.token_limit, 50000);
    }

    #[tokio::test]
    async fn test_model_override_and_tier_switch() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        let mut settings = UserSettings::default();
        settings.pro.api_key = Some("sk-pro".into());
        settings.pro.model = Some("anthropic/claude-3.5-haiku".into());
        storage.save(&settings).await.unwrap();

        assert_eq!(storage.current_tier().await, Tier::Free);
        storage.set_current_tier(Tier::Pro).await.unwrap();
        assert_eq!(storage.current_tier().await, Tier::Pro);

        let pro = storage.resolve_credential(Tier::Pro).await.unwrap();
        assert_eq!(pro.model_identifier, "anthropic/claude-3.5-haiku");

        storage.clear_keys().await.unwrap();
        assert_eq!(
            storage.resolve_credential(Tier::Pro).await,
            Err(GatewayError::MissingCredential)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_key_writes_are_all_kept() {
        for _ in 0..25 {
            let temp_dir = TempDir::new().unwrap();
            let storage = std::sync::Arc::new(storage(&temp_dir));

            let pro = {
                let storage = storage.clone();
                tokio::spawn(async move { storage.set_tier_key(Tier::Pro, "sk-pro-1111").await })
            };
            let ultra = {
                let storage = storage.clone();
                tokio::spawn(async move { storage.set_tier_key(Tier::Ultra, "sk-ultra-2222").await })
            };
            let primary = {
                let storage = storage.clone();
                tokio::spawn(async move { storage.set_primary_key("sk-primary-3333").await })
            };
            pro.await.unwrap().unwrap();
            ultra.await.unwrap().unwrap();
            primary.await.unwrap().unwrap();

            let loaded = storage.load().await.unwrap();
            assert_eq!(loaded.pro.api_key.as_deref(), Some("sk-pro-1111"));
            assert_eq!(loaded.ultra.api_key.as_deref(), Some("sk-ultra-2222"));
            assert_eq!(loaded.primary_key.as_deref(), Some("sk-primary-3333"));

            // A fresh reader sees the same key file
            let reopened = SettingsStorage::with_path(temp_dir.path().to_path_buf(), TierProfiles::default());
            assert_eq!(
                reopened.resolve_credential(Tier::Pro).await.unwrap().api_key,
                "sk-pro-1111"
            );
        }
    }

    #[tokio::test]
    async fn test_update_applies_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        let saved = storage
            .update(|s| {
                s.current_tier = Tier::Ultra;
                s.free.api_key = Some("sk-free".into());
            })
            .await
            .unwrap();
        assert_eq!(saved.current_tier, Tier::Ultra);

        let loaded = storage.load().await.unwrap();
        assert_eq!(loaded.free.api_key.as_deref(), Some("sk-free"));
        assert_eq!(loaded.current_tier, Tier::Ultra);
        // No temp file is left behind
        assert!(!temp_dir.path().join("settings.json.tmp").exists());
    }
}
