//! Settings that belong to the device rather than the clinic.

use serde_json::Value;

use crate::models::ClinicSnapshot;

pub const LANGUAGE_KEY: &str = "language";
pub const THEME_KEY: &str = "theme";
pub const PIN_KEY: &str = "devicePin";

/// Settings keys never stored in the cloud row.
pub const DEFAULT_CLOUD_EXCLUDED: [&str; 3] = [
    "rxBackgroundImage",
    "consentBackgroundImage",
    "instructionsBackgroundImage",
];

/// Device preferences stamped onto every merged snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceOverrides {
    pub language: Option<String>,
    pub theme: Option<String>,
    pub pin: Option<String>,
    pub cloud_excluded: Vec<String>,
}

impl Default for DeviceOverrides {
    fn default() -> Self {
        Self {
            language: None,
            theme: None,
            pin: None,
            cloud_excluded: DEFAULT_CLOUD_EXCLUDED.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl DeviceOverrides {
    /// Re-applies device-local values after a merge.
    ///
    /// Configured preferences win; otherwise the value `local` held before
    /// the merge is kept. Cloud-excluded settings and doctor letterheads are
    /// restored from `local` as well.
    pub fn apply(&self, merged: &mut ClinicSnapshot, local: &ClinicSnapshot) {
        let pinned = [
            (LANGUAGE_KEY, &self.language),
            (THEME_KEY, &self.theme),
            (PIN_KEY, &self.pin),
        ];
        for (key, configured) in pinned {
            match configured.as_ref().filter(|v| !v.is_empty()) {
                Some(value) => {
                    merged
                        .settings
                        .insert(key.to_string(), Value::String(value.clone()));
                }
                None => restore_key(merged, local, key),
            }
        }

        for key in &self.cloud_excluded {
            if local.settings.get(key).is_some_and(is_present) {
                restore_key(merged, local, key);
            }
        }

        for doctor in &mut merged.doctors {
            let kept = local
                .doctors
                .iter()
                .find(|d| d.id == doctor.id)
                .and_then(|d| d.rx_background_image.as_ref())
                .filter(|image| !image.is_empty());
            if let Some(image) = kept {
                doctor.rx_background_image = Some(image.clone());
            }
        }
    }

    /// Copy of `snapshot` fit for the shared row.
    ///
    /// Excluded settings and doctor letterheads are blanked; the device PIN
    /// is removed.
    pub fn redact_for_cloud(&self, snapshot: &ClinicSnapshot) -> ClinicSnapshot {
        let mut cloud = snapshot.clone();
        for key in &self.cloud_excluded {
            if let Some(value) = cloud.settings.get_mut(key) {
                *value = Value::String(String::new());
            }
        }
        cloud.settings.remove(PIN_KEY);
        for doctor in &mut cloud.doctors {
            if doctor.rx_background_image.is_some() {
                doctor.rx_background_image = Some(String::new());
            }
        }
        cloud
    }
}

fn is_present(value: &Value) -> bool {
    !matches!(value, Value::Null) && value.as_str() != Some("")
}

fn restore_key(merged: &mut ClinicSnapshot, local: &ClinicSnapshot, key: &str) {
    match local.settings.get(key) {
        Some(value) => {
            merged.settings.insert(key.to_string(), value.clone());
        }
        None => {
            merged.settings.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Doctor;
    use serde_json::json;

    fn with_settings(pairs: &[(&str, Value)]) -> ClinicSnapshot {
        let mut snapshot = ClinicSnapshot::default();
        for (k, v) in pairs {
            snapshot.settings.insert(k.to_string(), v.clone());
        }
        snapshot
    }

    #[test]
    fn test_configured_preferences_win() {
        let overrides = DeviceOverrides {
            language: Some("ar".into()),
            theme: Some("dark".into()),
            ..Default::default()
        };
        let local = with_settings(&[("language", json!("en"))]);
        let mut merged = with_settings(&[("language", json!("ku")), ("theme", json!("light"))]);

        overrides.apply(&mut merged, &local);
        assert_eq!(merged.settings["language"], json!("ar"));
        assert_eq!(merged.settings["theme"], json!("dark"));
    }

    #[test]
    fn test_unconfigured_preferences_come_from_local() {
        let overrides = DeviceOverrides::default();
        let local = with_settings(&[("language", json!("en")), ("devicePin", json!("1234"))]);
        let mut merged = with_settings(&[("language", json!("ku")), ("theme", json!("dark"))]);

        overrides.apply(&mut merged, &local);
        assert_eq!(merged.settings["language"], json!("en"));
        assert_eq!(merged.settings["devicePin"], json!("1234"));
        assert!(!merged.settings.contains_key("theme"));
    }

    #[test]
    fn test_redact_then_restore_excluded() {
        let overrides = DeviceOverrides::default();
        let mut local = with_settings(&[
            ("rxBackgroundImage", json!("data:image/png;base64,AAA")),
            ("currency", json!("IQD")),
            ("devicePin", json!("0000")),
        ]);
        local.doctors.push(Doctor {
            id: "d1".into(),
            rx_background_image: Some("data:letterhead".into()),
            ..Default::default()
        });

        let cloud = overrides.redact_for_cloud(&local);
        assert_eq!(cloud.settings["rxBackgroundImage"], json!(""));
        assert_eq!(cloud.settings["currency"], json!("IQD"));
        assert!(!cloud.settings.contains_key("devicePin"));
        assert_eq!(cloud.doctors[0].rx_background_image.as_deref(), Some(""));

        // The cloud copy comes back as the merge winner.
        let mut merged = cloud.clone();
        overrides.apply(&mut merged, &local);
        assert_eq!(merged.settings["rxBackgroundImage"], local.settings["rxBackgroundImage"]);
        assert_eq!(merged.settings["devicePin"], json!("0000"));
        assert_eq!(
            merged.doctors[0].rx_background_image.as_deref(),
            Some("data:letterhead")
        );
    }

    #[test]
    fn test_blank_local_does_not_erase_merged_value() {
        let overrides = DeviceOverrides::default();
        let local = with_settings(&[("consentBackgroundImage", json!(""))]);
        let mut merged = with_settings(&[("consentBackgroundImage", json!("remote"))]);

        overrides.apply(&mut merged, &local);
        assert_eq!(merged.settings["consentBackgroundImage"], json!("remote"));
    }
}
