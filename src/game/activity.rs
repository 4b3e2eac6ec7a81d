use bitflags::bitflags;
use chrono::NaiveTime;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActivityId(pub u16);

impl From<ActivityId> for usize {
    #[inline(always)]
    fn from(value: ActivityId) -> Self {
        value.0 as Self
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActivityTags: u16 {
        const DRINKING_GAME      = 1 << 0;
        const USES_TV            = 1 << 1;
        const CARD_GAME          = 1 << 2;
        const BOARD_GAME         = 1 << 3;
        const JACKBOX_GAME       = 1 << 4;
        const PHYSICAL_CHALLENGE = 1 << 5;
        const CREATIVE           = 1 << 6;
        const ANNOYING           = 1 << 7;
        const WHAT               = 1 << 8;
        const OUTSIDE            = 1 << 9;
        const COMPETITIVE        = 1 << 10;
        const COLLABORATIVE      = 1 << 11;
    }
}

// (flag, catalog key, receipt name), in bit order.
static TAG_TABLE: [(ActivityTags, &str, &str); 12] = [
    (ActivityTags::DRINKING_GAME, "drinking_game", "Drinking Game"),
    (ActivityTags::USES_TV, "uses_tv", "Uses TV"),
    (ActivityTags::CARD_GAME, "card_game", "Card Game"),
    (ActivityTags::BOARD_GAME, "board_game", "Board Game"),
    (ActivityTags::JACKBOX_GAME, "jackbox_game", "Jackbox Game"),
    (ActivityTags::PHYSICAL_CHALLENGE, "physical_challenge", "Physical Challenge"),
    (ActivityTags::CREATIVE, "creative", "Creative"),
    (ActivityTags::ANNOYING, "annoying", "Annoying"),
    (ActivityTags::WHAT, "what", "What?"),
    (ActivityTags::OUTSIDE, "outside", "Outside"),
    (ActivityTags::COMPETITIVE, "competitive", "Competitive"),
    (ActivityTags::COLLABORATIVE, "collaborative", "Collaborative"),
];

impl ActivityTags {
    /// Looks up a single tag by its catalog key. Case, spaces and dashes are ignored.
    pub fn from_key(key: &str) -> Option<Self> {
        let mut norm = String::with_capacity(key.len());
        for ch in key.trim().chars() {
            match ch {
                ' ' | '-' | '_' => norm.push('_'),
                c if c.is_ascii_alphanumeric() => norm.push(c.to_ascii_lowercase()),
                _ => {}
            }
        }
        TAG_TABLE
            .iter()
            .find(|(_, k, _)| *k == norm)
            .map(|(flag, _, _)| *flag)
    }

    pub fn display_names(self) -> impl Iterator<Item = &'static str> {
        TAG_TABLE
            .iter()
            .filter(move |(flag, _, _)| self.contains(*flag))
            .map(|(_, _, name)| *name)
    }

    /// Comma-joined display names, in bit order.
    pub fn summary(self) -> String {
        self.display_names().collect::<Vec<_>>().join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    #[inline(always)]
    pub const fn matches(self, n: u8) -> bool {
        match self {
            Self::Even => n % 2 == 0,
            Self::Odd => n % 2 == 1,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Even => "even",
            Self::Odd => "odd",
        }
    }
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "even" => Ok(Self::Even),
            "odd" => Ok(Self::Odd),
            other => Err(format!("'{other}' is not a valid parity")),
        }
    }
}

/// Which group sizes an activity can be played with. Every present
/// constraint must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerCountRule {
    pub exact: Option<u8>,
    pub min: Option<u8>,
    pub max: Option<u8>,
    pub parity: Option<Parity>,
}

impl PlayerCountRule {
    pub fn allows(&self, players: u8) -> bool {
        if self.exact.is_some_and(|n| n != players) {
            return false;
        }
        if self.min.is_some_and(|n| players < n) {
            return false;
        }
        if self.max.is_some_and(|n| players > n) {
            return false;
        }
        if self.parity.is_some_and(|p| !p.matches(players)) {
            return false;
        }
        true
    }

    /// Human readable group size, e.g. "2-5 players" or "4+ players, even".
    pub fn summary(&self) -> String {
        let count = match (self.exact, self.min, self.max) {
            (Some(n), _, _) => plural(n),
            (None, Some(lo), Some(hi)) if lo == hi => plural(lo),
            (None, Some(lo), Some(hi)) => format!("{lo}-{hi} players"),
            (None, Some(lo), None) => format!("{lo}+ players"),
            (None, None, Some(hi)) => format!("up to {}", plural(hi)),
            (None, None, None) => "any number of players".to_string(),
        };
        match self.parity {
            Some(p) if self.exact.is_none() => format!("{count}, {}", p.as_str()),
            _ => count,
        }
    }
}

fn plural(n: u8) -> String {
    if n == 1 {
        "1 player".to_string()
    } else {
        format!("{n} players")
    }
}

/// Time-of-day window. `from > until` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Availability {
    pub from: Option<NaiveTime>,
    pub until: Option<NaiveTime>,
}

impl Availability {
    pub fn is_open(&self, now: NaiveTime) -> bool {
        match (self.from, self.until) {
            (None, None) => true,
            (Some(from), None) => now >= from,
            (None, Some(until)) => now < until,
            (Some(from), Some(until)) if from <= until => now >= from && now < until,
            (Some(from), Some(until)) => now >= from || now < until,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Activity {
    pub name: String,
    pub description: String,
    pub tags: ActivityTags,
    pub players: PlayerCountRule,
    pub weight: u32,
    pub availability: Availability,
    pub qr_link: Option<String>,
}

impl Activity {
    /// Text shown on the reel.
    pub fn label(&self) -> String {
        self.name.to_uppercase()
    }

    #[inline(always)]
    pub fn has_qr(&self) -> bool {
        self.qr_link.as_deref().is_some_and(|l| !l.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::{ActivityTags, Availability, Parity, PlayerCountRule};
    use chrono::NaiveTime;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    #[test]
    fn player_rule_checks_every_constraint() {
        let rule = PlayerCountRule {
            exact: None,
            min: Some(2),
            max: Some(6),
            parity: Some(Parity::Even),
        };
        assert!(!rule.allows(1));
        assert!(rule.allows(2));
        assert!(!rule.allows(3));
        assert!(rule.allows(6));
        assert!(!rule.allows(8));

        let exact = PlayerCountRule {
            exact: Some(4),
            ..PlayerCountRule::default()
        };
        assert!(exact.allows(4));
        assert!(!exact.allows(5));
        assert!(PlayerCountRule::default().allows(10));
    }

    #[test]
    fn player_rule_summaries() {
        let r = |exact, min, max, parity| PlayerCountRule {
            exact,
            min,
            max,
            parity,
        };
        assert_eq!(r(Some(1), None, None, None).summary(), "1 player");
        assert_eq!(r(Some(3), None, None, None).summary(), "3 players");
        assert_eq!(r(None, Some(2), Some(5), None).summary(), "2-5 players");
        assert_eq!(r(None, Some(4), None, None).summary(), "4+ players");
        assert_eq!(r(None, None, Some(4), None).summary(), "up to 4 players");
        assert_eq!(
            r(None, Some(2), None, Some(Parity::Even)).summary(),
            "2+ players, even"
        );
        assert_eq!(r(None, None, None, None).summary(), "any number of players");
    }

    #[test]
    fn tag_keys_and_summary() {
        assert_eq!(ActivityTags::from_key("Uses TV"), Some(ActivityTags::USES_TV));
        assert_eq!(
            ActivityTags::from_key("physical-challenge"),
            Some(ActivityTags::PHYSICAL_CHALLENGE)
        );
        assert_eq!(ActivityTags::from_key("nope"), None);

        let tags = ActivityTags::COLLABORATIVE | ActivityTags::DRINKING_GAME | ActivityTags::WHAT;
        assert_eq!(tags.summary(), "Drinking Game, What?, Collaborative");
        assert_eq!(ActivityTags::empty().summary(), "");
    }

    #[test]
    fn availability_window_wraps_midnight() {
        let evening = Availability {
            from: Some(hm(20, 0)),
            until: Some(hm(2, 0)),
        };
        assert!(evening.is_open(hm(23, 30)));
        assert!(evening.is_open(hm(1, 59)));
        assert!(!evening.is_open(hm(2, 0)));
        assert!(!evening.is_open(hm(12, 0)));

        let day = Availability {
            from: Some(hm(9, 0)),
            until: Some(hm(17, 0)),
        };
        assert!(day.is_open(hm(9, 0)));
        assert!(!day.is_open(hm(17, 0)));
        assert!(Availability::default().is_open(hm(3, 0)));
    }
}
