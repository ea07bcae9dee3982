//! Audit settings
//!
//! Loaded from TOML. Every key is optional; missing keys take the defaults
//! below.
//!
//! ```toml
//! date_format = "%d.%m.%Y"
//! deleted_placeholder = "<gelöschtes Objekt>"
//! yes = "ja"
//! no = "nein"
//! log_profile = "production"
//! ```

use crate::errors::{AuditError, Result};
use crate::logging_facility::Profile;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::fmt::Write;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditSettings {
    /// chrono format used to localize dates before they are stored
    pub date_format: String,
    pub time_format: String,
    pub datetime_format: String,
    /// Shown in place of related objects that no longer exist
    pub deleted_placeholder: String,
    pub yes: String,
    pub no: String,
    /// Shown for a boolean field holding null
    pub maybe: String,
    pub log_profile: Profile,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            date_format: "%b. %-d, %Y".to_string(),
            time_format: "%H:%M".to_string(),
            datetime_format: "%b. %-d, %Y, %H:%M".to_string(),
            deleted_placeholder: "<deleted object>".to_string(),
            yes: "yes".to_string(),
            no: "no".to_string(),
            maybe: "maybe".to_string(),
            log_profile: Profile::Development,
        }
    }
}

impl AuditSettings {
    /// Parse settings from a TOML document
    ///
    /// # Errors
    ///
    /// `Config` for malformed TOML, unknown keys, or a date/time format with
    /// an unsupported specifier.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings: Self = toml::from_str(source).map_err(|e| AuditError::Config {
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that every format string is understood by chrono
    pub fn validate(&self) -> Result<()> {
        for (key, format) in [
            ("date_format", &self.date_format),
            ("time_format", &self.time_format),
            ("datetime_format", &self.datetime_format),
        ] {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(AuditError::Config {
                    message: format!("invalid {}: '{}'", key, format),
                });
            }
        }
        Ok(())
    }

    /// Read settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| AuditError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&source)
    }

    /// Falls back to ISO 8601 when `date_format` cannot be rendered
    pub fn localize_date(&self, date: &NaiveDate) -> String {
        render(date.format(&self.date_format)).unwrap_or_else(|| date.to_string())
    }

    pub fn localize_time(&self, time: &NaiveTime) -> String {
        render(time.format(&self.time_format)).unwrap_or_else(|| time.to_string())
    }

    pub fn localize_datetime(&self, datetime: &DateTime<Utc>) -> String {
        render(datetime.format(&self.datetime_format)).unwrap_or_else(|| datetime.to_rfc3339())
    }
}

fn render(formatted: impl std::fmt::Display) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", formatted).ok()?;
    Some(out)
}
