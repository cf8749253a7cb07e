use crate::config::Settings;
use serde::{Deserialize, Serialize};

/// Identifier kinds the decision service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Video,
    Channel,
    Handle,
    Playlist,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub kind: ItemKind,
    pub id: String,
}

impl Item {
    pub fn new(kind: ItemKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    NoCredential,
    NotFound,
    AllowedNoCountry,
    BlockedNoCountry,
    BlockedCountry,
    Allowed,
    PlaylistOwnerBlocked,
    PlaylistOwnerAllowed,
    PlaylistNoChannel,
    PlaylistMajorityBlocked,
    PlaylistItemBlocked,
    NotMajority,
    NoSampledBlocks,
    NoSampledItems,
    FetchFailed,
    Error,
}

impl Reason {
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            Reason::BlockedCountry
                | Reason::BlockedNoCountry
                | Reason::PlaylistOwnerBlocked
                | Reason::PlaylistMajorityBlocked
                | Reason::PlaylistItemBlocked
        )
    }
}

/// Outcome for one identifier. `blocked` always agrees with `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub blocked: bool,
    pub reason: Reason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Verdict {
    pub fn new(reason: Reason, country: Option<String>) -> Self {
        Self {
            blocked: reason.is_blocking(),
            reason,
            country,
        }
    }

    pub fn allowed(reason: Reason) -> Self {
        debug_assert!(!reason.is_blocking());
        Self::new(reason, None)
    }

    /// Decision for a channel whose country lookup has completed.
    pub fn for_channel_country(country: Option<&str>, settings: &Settings) -> Self {
        match country {
            None if settings.block_if_no_country => Self::new(Reason::BlockedNoCountry, None),
            None => Self::new(Reason::AllowedNoCountry, None),
            Some(code) if settings.is_country_blocked(code) => {
                Self::new(Reason::BlockedCountry, Some(code.to_string()))
            }
            Some(code) => Self::new(Reason::Allowed, Some(code.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::normalize_countries;

    fn settings(blocked: &[&str], block_if_no_country: bool) -> Settings {
        Settings {
            credential: "key".to_string(),
            blocked_countries: normalize_countries(blocked),
            block_if_no_country,
            ..Settings::default()
        }
    }

    #[test]
    fn test_channel_country_decisions() {
        let s = settings(&["US", "CN"], false);
        assert_eq!(
            Verdict::for_channel_country(Some("US"), &s),
            Verdict {
                blocked: true,
                reason: Reason::BlockedCountry,
                country: Some("US".to_string())
            }
        );
        assert_eq!(
            Verdict::for_channel_country(Some("DE"), &s),
            Verdict {
                blocked: false,
                reason: Reason::Allowed,
                country: Some("DE".to_string())
            }
        );
        assert_eq!(
            Verdict::for_channel_country(None, &s),
            Verdict::allowed(Reason::AllowedNoCountry)
        );

        let strict = settings(&["US"], true);
        let v = Verdict::for_channel_country(None, &strict);
        assert!(v.blocked);
        assert_eq!(v.reason, Reason::BlockedNoCountry);
        assert_eq!(v.country, None);
    }

    #[test]
    fn test_verdict_json_shape() {
        let json = serde_json::to_value(Verdict::allowed(Reason::NoCredential)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"blocked": false, "reason": "no-credential"})
        );

        let json =
            serde_json::to_value(Verdict::new(Reason::BlockedCountry, Some("CN".into()))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"blocked": true, "reason": "blocked-country", "country": "CN"})
        );
    }

    #[test]
    fn test_only_block_reasons_block() {
        for reason in [
            Reason::NoCredential,
            Reason::NotFound,
            Reason::AllowedNoCountry,
            Reason::FetchFailed,
            Reason::Error,
            Reason::NoSampledItems,
        ] {
            assert!(!Verdict::allowed(reason).blocked);
        }
    }
}
