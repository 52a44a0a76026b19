//! Per-install device fingerprint sent with login and ballots.

use std::sync::{Arc, OnceLock};

/// Platform facts the fingerprint is built from.
///
/// Every accessor is a best-effort query. `None` means the platform could
/// not answer.
pub trait DevicePlatform: Send + Sync {
    fn brand(&self) -> Option<String>;
    fn model(&self) -> Option<String>;
    fn os_name(&self) -> Option<String>;
    fn os_version(&self) -> Option<String>;
    fn app_version(&self) -> Option<String>;
    /// Identifier that survives restarts of this installation.
    fn installation_id(&self) -> Option<String>;
}

/// Value-backed platform, for hosts that know their facts up front.
#[derive(Debug, Clone, Default)]
pub struct StaticPlatform {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
    pub installation_id: Option<String>,
}

impl StaticPlatform {
    /// Describe the host this process runs on.
    pub fn host(app_version: &str, installation_id: Option<String>) -> Self {
        Self {
            brand: None,
            model: Some(std::env::consts::ARCH.to_string()),
            os_name: Some(std::env::consts::OS.to_string()),
            os_version: None,
            app_version: Some(app_version.to_string()),
            installation_id,
        }
    }
}

impl DevicePlatform for StaticPlatform {
    fn brand(&self) -> Option<String> {
        self.brand.clone()
    }

    fn model(&self) -> Option<String> {
        self.model.clone()
    }

    fn os_name(&self) -> Option<String> {
        self.os_name.clone()
    }

    fn os_version(&self) -> Option<String> {
        self.os_version.clone()
    }

    fn app_version(&self) -> Option<String> {
        self.app_version.clone()
    }

    fn installation_id(&self) -> Option<String> {
        self.installation_id.clone()
    }
}

/// Derives the device identity string.
///
/// Format: `Brand Model (OS Version) - App vX.Y.Z - ID: install-id`.
#[derive(Clone)]
pub struct DeviceIdentity {
    platform: Arc<dyn DevicePlatform>,
    /// Random id used for the lifetime of this process when the platform
    /// has no installation id.
    session_fallback: Arc<OnceLock<String>>,
}

impl DeviceIdentity {
    pub fn new(platform: Arc<dyn DevicePlatform>) -> Self {
        Self {
            platform,
            session_fallback: Arc::new(OnceLock::new()),
        }
    }

    /// The fingerprint for this install. Never fails.
    pub fn identity(&self) -> String {
        let p = &self.platform;

        let brand = non_empty(p.brand()).unwrap_or_else(|| "Unknown Brand".to_string());
        let model = non_empty(p.model()).unwrap_or_else(|| "Unknown Model".to_string());
        let os_name = non_empty(p.os_name()).unwrap_or_else(|| "Unknown OS".to_string());
        let os_version = non_empty(p.os_version()).unwrap_or_else(|| "0".to_string());
        let app_version = non_empty(p.app_version()).unwrap_or_else(|| "1.0.0".to_string());
        let id = non_empty(p.installation_id()).unwrap_or_else(|| self.fallback_id().to_string());

        format!(
            "{} {} ({} {}) - App v{} - ID: {}",
            brand, model, os_name, os_version, app_version, id
        )
    }

    fn fallback_id(&self) -> &str {
        self.session_fallback.get_or_init(|| {
            tracing::warn!("Platform installation id unavailable, using a session-scoped id");
            uuid::Uuid::new_v4().to_string()
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone() -> StaticPlatform {
        StaticPlatform {
            brand: Some("Apple".to_string()),
            model: Some("iPhone 14 Pro".to_string()),
            os_name: Some("iOS".to_string()),
            os_version: Some("16.5".to_string()),
            app_version: Some("1.0.0".to_string()),
            installation_id: Some("A1B2C3D4-E5F6-7890".to_string()),
        }
    }

    #[test]
    fn test_identity_format() {
        let device = DeviceIdentity::new(Arc::new(phone()));
        assert_eq!(
            device.identity(),
            "Apple iPhone 14 Pro (iOS 16.5) - App v1.0.0 - ID: A1B2C3D4-E5F6-7890"
        );
    }

    #[test]
    fn test_missing_fields_use_placeholders() {
        let platform = StaticPlatform {
            installation_id: Some("abc".to_string()),
            ..Default::default()
        };
        let device = DeviceIdentity::new(Arc::new(platform));
        assert_eq!(
            device.identity(),
            "Unknown Brand Unknown Model (Unknown OS 0) - App v1.0.0 - ID: abc"
        );
    }

    #[test]
    fn test_fallback_id_is_stable_within_process() {
        let platform = StaticPlatform {
            installation_id: None,
            ..phone()
        };
        let device = DeviceIdentity::new(Arc::new(platform));
        let first = device.identity();
        assert_eq!(first, device.identity());
        assert_eq!(first, device.clone().identity());
        assert!(!first.ends_with("ID: "));
    }
}
