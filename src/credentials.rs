use anyhow::Result;
use std::env;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

const KEYRING_SERVICE: &str = "zero";

/// The secrets the CLI needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret {
    /// Key for the chat completions API
    ApiKey,
    /// Already-issued Gmail OAuth2 access token
    GmailToken,
}

impl Secret {
    pub const ALL: [Secret; 2] = [Secret::ApiKey, Secret::GmailToken];

    pub fn env_var(self) -> &'static str {
        match self {
            Secret::ApiKey => "ZERO_API_KEY",
            Secret::GmailToken => "ZERO_GMAIL_TOKEN",
        }
    }

    fn keyring_user(self) -> &'static str {
        match self {
            Secret::ApiKey => "api-key",
            Secret::GmailToken => "gmail-token",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            Secret::ApiKey => ".api_key",
            Secret::GmailToken => ".gmail_token",
        }
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Secret::ApiKey => "API key",
            Secret::GmailToken => "Gmail access token",
        })
    }
}

/// Debug information about credential storage backends
#[derive(Debug, Clone)]
pub struct CredentialDebugInfo {
    pub keyring_available: bool,
    pub env_vars_set: Vec<&'static str>,
    pub dir: PathBuf,
    pub files_present: Vec<&'static str>,
}

impl fmt::Display for CredentialDebugInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Credential Storage Status:")?;
        writeln!(
            f,
            "  Keyring: {}",
            if self.keyring_available {
                "available"
            } else {
                "unavailable"
            }
        )?;
        for secret in Secret::ALL {
            let var = secret.env_var();
            writeln!(
                f,
                "  Environment var ({}): {}",
                var,
                if self.env_vars_set.contains(&var) {
                    "set"
                } else {
                    "not set"
                }
            )?;
        }
        writeln!(f, "  File fallback: {}", self.dir.display())?;
        writeln!(f, "  Files present: {}", self.files_present.len())?;
        Ok(())
    }
}

pub struct CredentialStore {
    dir: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        let dir = crate::config::Config::config_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { dir }
    }

    #[cfg(test)]
    fn in_dir(dir: &std::path::Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn secret_file(&self, secret: Secret) -> PathBuf {
        self.dir.join(secret.file_name())
    }

    /// Get diagnostic info about credential storage backend
    pub fn debug_info(&self) -> CredentialDebugInfo {
        let keyring_available = if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, "probe") {
            // Try a dummy operation to see if keyring works
            entry.set_password("__test__").is_ok()
                && entry.get_password().is_ok()
                && entry.delete_credential().is_ok()
        } else {
            false
        };

        CredentialDebugInfo {
            keyring_available,
            env_vars_set: Secret::ALL
                .iter()
                .filter(|s| Self::env_get(**s).is_some())
                .map(|s| s.env_var())
                .collect(),
            dir: self.dir.clone(),
            files_present: Secret::ALL
                .iter()
                .filter(|s| self.secret_file(**s).exists())
                .map(|s| s.file_name())
                .collect(),
        }
    }

    fn env_get(secret: Secret) -> Option<String> {
        env::var(secret.env_var())
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn keyring_get(secret: Secret) -> Option<String> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, secret.keyring_user()).ok()?;
        entry.get_password().ok()
    }

    fn keyring_set(secret: Secret, value: &str) -> bool {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, secret.keyring_user()) {
            entry.set_password(value).is_ok()
        } else {
            false
        }
    }

    fn file_get(&self, secret: Secret) -> Option<String> {
        fs::read_to_string(self.secret_file(secret))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Write a secret to its fallback file (with restricted permissions)
    fn file_set(&self, secret: Secret, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.secret_file(secret);

        // Create file with restricted permissions atomically to avoid TOCTOU
        #[cfg(unix)]
        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)?;
            file.write_all(value.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&path, value)?;
        }

        Ok(())
    }

    /// Environment, then keyring, then the fallback file.
    pub fn get(&self, secret: Secret) -> Result<String> {
        if let Some(value) = Self::env_get(secret) {
            return Ok(value);
        }
        if let Some(value) = Self::keyring_get(secret) {
            return Ok(value);
        }
        if let Some(value) = self.file_get(secret) {
            return Ok(value);
        }

        anyhow::bail!(
            "{} not found. Set {} or run 'zero setup'.",
            secret,
            secret.env_var()
        )
    }

    pub fn set(&self, secret: Secret, value: &str) -> Result<()> {
        if Self::keyring_set(secret, value) && Self::keyring_get(secret).is_some() {
            return Ok(());
        }

        eprintln!("Note: Keyring unavailable, using file-based storage.");
        self.file_set(secret, value)
    }

    pub fn has(&self, secret: Secret) -> bool {
        Self::env_get(secret).is_some()
            || Self::keyring_get(secret).is_some()
            || self.file_get(secret).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to prevent parallel test interference with env vars
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("zero_creds_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_env_value() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let store = CredentialStore::in_dir(&temp_dir("env"));
        unsafe { env::set_var(Secret::ApiKey.env_var(), " sk-test ") };

        assert!(store.has(Secret::ApiKey));
        assert_eq!(store.get(Secret::ApiKey).unwrap(), "sk-test");

        unsafe { env::remove_var(Secret::ApiKey.env_var()) };
    }

    #[test]
    fn test_secrets_use_separate_files() {
        let dir = temp_dir("separate");
        let store = CredentialStore::in_dir(&dir);

        store.file_set(Secret::ApiKey, "key").unwrap();
        store.file_set(Secret::GmailToken, "token").unwrap();

        assert_ne!(
            store.secret_file(Secret::ApiKey),
            store.secret_file(Secret::GmailToken)
        );
        assert_eq!(store.file_get(Secret::ApiKey), Some("key".to_string()));
        assert_eq!(store.file_get(Secret::GmailToken), Some("token".to_string()));

        let _ = fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = temp_dir("private");
        let store = CredentialStore::in_dir(&dir);
        store.file_set(Secret::GmailToken, "token").unwrap();

        let mode = fs::metadata(store.secret_file(Secret::GmailToken))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_env_takes_priority() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = temp_dir("priority");
        let store = CredentialStore::in_dir(&dir);

        store.file_set(Secret::GmailToken, "file_token").unwrap();
        unsafe { env::set_var(Secret::GmailToken.env_var(), "env_token") };

        assert_eq!(store.get(Secret::GmailToken).unwrap(), "env_token");

        unsafe { env::remove_var(Secret::GmailToken.env_var()) };
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_blank_file_is_ignored() {
        let dir = temp_dir("blank");
        let store = CredentialStore::in_dir(&dir);
        store.file_set(Secret::ApiKey, "  \n").unwrap();
        assert_eq!(store.file_get(Secret::ApiKey), None);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_debug_info() {
        let store = CredentialStore::in_dir(&temp_dir("debug"));
        let info = store.debug_info();

        let display = format!("{}", info);
        assert!(display.contains("Credential Storage Status:"));
        assert!(display.contains("ZERO_API_KEY"));
        assert!(display.contains("ZERO_GMAIL_TOKEN"));
        assert!(display.contains("File fallback:"));
    }
}
