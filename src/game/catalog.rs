use crate::game::activity::{
    Activity, ActivityId, ActivityTags, Availability, Parity, PlayerCountRule,
};
use chrono::NaiveTime;
use log::{info, warn};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;

/// Player counts the flow lets people pick.
pub const SUPPORTED_PLAYER_COUNTS: RangeInclusive<u8> = 1..=10;

/// Weights are expanded into repeated pool entries, so they stay small.
pub const MAX_WEIGHT: u32 = 100;

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid { index: usize, reason: String },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read activity catalog: {e}"),
            Self::Json(e) => write!(f, "malformed activity catalog: {e}"),
            Self::Invalid { index, reason } => {
                write!(f, "invalid activity at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

// --- On-disk format ---

#[derive(Deserialize, Debug)]
struct RawActivity {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    players: RawPlayers,
    #[serde(default)]
    weight: Option<u32>,
    #[serde(default)]
    available: RawAvailability,
    #[serde(default)]
    qr_link: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct RawPlayers {
    exact: Option<u8>,
    min: Option<u8>,
    max: Option<u8>,
    parity: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct RawAvailability {
    from: Option<String>,
    until: Option<String>,
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| format!("'{s}' is not a HH:MM time ({e})"))
}

fn convert(raw: RawActivity) -> Result<Activity, String> {
    let name = raw.name.trim().to_string();
    if name.is_empty() {
        return Err("name is empty".to_string());
    }

    let mut tags = ActivityTags::empty();
    for key in &raw.tags {
        tags |= ActivityTags::from_key(key).ok_or_else(|| format!("unknown tag '{key}'"))?;
    }

    let parity = raw
        .players
        .parity
        .as_deref()
        .map(Parity::from_str)
        .transpose()?;
    let players = PlayerCountRule {
        exact: raw.players.exact,
        min: raw.players.min,
        max: raw.players.max,
        parity,
    };

    let weight = match raw.weight {
        Some(0) => {
            warn!("Activity '{name}' has weight 0; treating it as 1.");
            1
        }
        Some(w) if w > MAX_WEIGHT => {
            warn!("Activity '{name}' has weight {w}; capping it at {MAX_WEIGHT}.");
            MAX_WEIGHT
        }
        Some(w) => w,
        None => 1,
    };

    let availability = Availability {
        from: raw.available.from.as_deref().map(parse_time).transpose()?,
        until: raw.available.until.as_deref().map(parse_time).transpose()?,
    };

    Ok(Activity {
        name,
        description: raw.description,
        tags,
        players,
        weight,
        availability,
        qr_link: raw.qr_link.filter(|l| !l.trim().is_empty()),
    })
}

/// Immutable, ordered list of every activity the wheel knows about.
#[derive(Debug, Default)]
pub struct Catalog {
    activities: Vec<Activity>,
}

impl Catalog {
    pub fn new(activities: Vec<Activity>) -> Self {
        Self { activities }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let raw: Vec<RawActivity> = serde_json::from_str(json)?;
        let mut activities = Vec::with_capacity(raw.len());
        let mut seen: FxHashSet<String> = FxHashSet::default();
        for (index, entry) in raw.into_iter().enumerate() {
            let activity = convert(entry).map_err(|reason| CatalogError::Invalid { index, reason })?;
            if !seen.insert(activity.name.to_lowercase()) {
                return Err(CatalogError::Invalid {
                    index,
                    reason: format!("duplicate name '{}'", activity.name),
                });
            }
            activities.push(activity);
        }
        if activities.len() > usize::from(u16::MAX) {
            return Err(CatalogError::Invalid {
                index: usize::from(u16::MAX),
                reason: "too many activities".to_string(),
            });
        }
        Ok(Self::new(activities))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&content)?;
        info!(
            "Loaded {} activities from '{}'.",
            catalog.len(),
            path.display()
        );
        if catalog.is_empty() {
            warn!("Activity catalog '{}' is empty.", path.display());
            return Ok(catalog);
        }
        let uncovered = catalog.uncovered_player_counts(SUPPORTED_PLAYER_COUNTS);
        if !uncovered.is_empty() {
            warn!("No activity supports these player counts: {uncovered:?}");
        }
        Ok(catalog)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    #[inline(always)]
    pub fn get(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.get(usize::from(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActivityId, &Activity)> {
        self.activities
            .iter()
            .enumerate()
            .map(|(i, a)| (ActivityId(i as u16), a))
    }

    #[cfg(test)]
    pub fn find(&self, name: &str) -> Option<ActivityId> {
        self.iter()
            .find(|(_, a)| a.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id)
    }

    /// Player counts in `range` that no activity accepts, ignoring
    /// availability windows and exclusion pools.
    pub fn uncovered_player_counts(&self, range: RangeInclusive<u8>) -> Vec<u8> {
        range
            .filter(|&n| !self.activities.iter().any(|a| a.players.allows(n)))
            .collect()
    }

    /// Every activity, each repeated `weight` times.
    pub fn weighted_entries(&self) -> Vec<ActivityId> {
        let mut out = Vec::new();
        for (id, a) in self.iter() {
            push_weighted(&mut out, id, a.weight);
        }
        out
    }
}

#[inline(always)]
pub fn push_weighted(out: &mut Vec<ActivityId>, id: ActivityId, weight: u32) {
    out.extend(std::iter::repeat_n(id, weight.clamp(1, MAX_WEIGHT) as usize));
}
