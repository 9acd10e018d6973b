//! User settings.

use crate::error::CoreResult;
use crate::model::Setting;
use crate::types::RecordKey;
use crate::vault::CodeVault;
use serde_json::Value;
use std::collections::BTreeMap;

impl CodeVault {
    /// Reads a setting.
    pub fn get_setting(&self, key: &str) -> CoreResult<Option<Value>> {
        if key.is_empty() {
            return Ok(None);
        }
        let setting: Option<Setting> = self.db.get_as(&self.names.settings, &RecordKey::text(key))?;
        Ok(setting.map(|s| s.value))
    }

    /// Reads a setting, falling back to `default` when it is not set.
    pub fn get_setting_or(&self, key: &str, default: Value) -> CoreResult<Value> {
        Ok(self.get_setting(key)?.unwrap_or(default))
    }

    /// Stores a setting. An empty key is ignored and returns `false`.
    pub fn save_setting(&self, key: &str, value: Value) -> CoreResult<bool> {
        if key.is_empty() {
            return Ok(false);
        }
        let setting = Setting {
            key: key.to_string(),
            value,
        };
        self.db.put_as(&self.names.settings, &setting)?;
        Ok(true)
    }

    /// Removes a setting. Returns whether it was set.
    pub fn delete_setting(&self, key: &str) -> CoreResult<bool> {
        if key.is_empty() {
            return Ok(false);
        }
        self.db.delete(&self.names.settings, &RecordKey::text(key))
    }

    /// Every setting by key.
    pub fn get_all_settings(&self) -> CoreResult<BTreeMap<String, Value>> {
        let settings: Vec<Setting> = self.db.get_all_as(&self.names.settings)?;
        Ok(settings.into_iter().map(|s| (s.key, s.value)).collect())
    }
}
