// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rider profile snapshot and the upstream field-name fallback table.
//!
//! Zwift has renamed profile fields over time. Each logical field maps to an
//! ordered list of upstream names and the first one holding a usable value
//! wins. Supporting another rename means editing [`PROFILE_FIELDS`] only.

use serde::Serialize;
use serde_json::{Map, Value};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::AppError;

/// Ordered upstream names for each profile field.
#[derive(Debug, Clone, Copy)]
pub struct ProfileFieldTable {
    pub athlete_id: &'static [&'static str],
    pub first_name: &'static [&'static str],
    pub last_name: &'static [&'static str],
    pub email: &'static [&'static str],
    pub country: &'static [&'static str],
    pub xp: &'static [&'static str],
    pub level: &'static [&'static str],
}

/// Known upstream field names, most preferred first.
pub const PROFILE_FIELDS: ProfileFieldTable = ProfileFieldTable {
    athlete_id: &["id", "playerId"],
    first_name: &["firstName"],
    last_name: &["lastName"],
    email: &["emailAddress", "email"],
    country: &["countryAlpha3", "countryCode"],
    xp: &["totalXp", "totalExperiencePoints"],
    level: &["level", "achievementLevel"],
};

/// Read-only snapshot of a rider profile, replaced wholesale on every sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub athlete_id: u64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub xp: u64,
    pub level: u64,
}

impl Profile {
    /// Extract a profile from an upstream JSON document using [`PROFILE_FIELDS`].
    pub fn from_upstream(doc: &Value) -> Result<Self, AppError> {
        Self::from_upstream_with(doc, &PROFILE_FIELDS)
    }

    /// Extract using a custom field table.
    ///
    /// Missing XP or level count as zero. A missing athlete id means the
    /// document is not a profile at all.
    pub fn from_upstream_with(doc: &Value, fields: &ProfileFieldTable) -> Result<Self, AppError> {
        let obj = doc.as_object().ok_or_else(|| {
            AppError::UpstreamUnavailable("profile response is not an object".to_string())
        })?;

        let athlete_id = first_u64(obj, fields.athlete_id).ok_or_else(|| {
            AppError::UpstreamUnavailable("profile response has no athlete id".to_string())
        })?;

        Ok(Self {
            athlete_id,
            first_name: first_string(obj, fields.first_name),
            last_name: first_string(obj, fields.last_name),
            email: first_string(obj, fields.email),
            country: first_string(obj, fields.country),
            xp: first_u64(obj, fields.xp).unwrap_or(0),
            level: first_u64(obj, fields.level).unwrap_or(0),
        })
    }

    /// Athlete id of a raw profile document, if it has one.
    pub fn athlete_id_of(doc: &Value) -> Option<u64> {
        first_u64(doc.as_object()?, PROFILE_FIELDS.athlete_id)
    }

    /// Subset returned on login.
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.athlete_id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            country_alpha3: self.country.clone(),
        }
    }

    /// Subset returned on sync (no contact details).
    pub fn brief(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.athlete_id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: None,
            country_alpha3: None,
        }
    }
}

/// Profile fields that cross the API boundary.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileSummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_alpha3: Option<String>,
}

/// Copy XP and level from a player stats document onto a raw profile
/// document, under the preferred field names. Values the stats lack are
/// left as the profile had them.
pub fn overlay_progress(profile: &mut Value, stats: &Value, fields: &ProfileFieldTable) {
    let (Some(target), Some(source)) = (profile.as_object_mut(), stats.as_object()) else {
        return;
    };
    for names in [fields.xp, fields.level] {
        if let (Some(value), Some(preferred)) = (first_u64(source, names), names.first()) {
            target.insert(preferred.to_string(), Value::from(value));
        }
    }
}

fn first_u64(obj: &Map<String, Value>, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| match obj.get(*name)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn first_string(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match obj.get(*name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
