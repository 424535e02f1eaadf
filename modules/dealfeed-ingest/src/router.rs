//! Channel routing: map an incoming chat to its page, platform, and
//! affiliate strategy. Unknown chats fall through to a quarantine page so
//! no message is dropped on a config mistake.

use std::collections::HashMap;
use std::path::Path;

use dealfeed_common::{AffiliateStrategy, ChannelConfig, Result, FALLBACK_PAGE_SLUG};

/// Outcome of a routing lookup.
#[derive(Debug, Clone)]
pub struct Route {
    pub config: ChannelConfig,
    /// False when the fallback config was substituted for an unknown chat.
    pub matched: bool,
}

pub struct ChannelRegistry {
    by_id: HashMap<i64, ChannelConfig>,
    by_title: HashMap<String, ChannelConfig>,
}

impl ChannelRegistry {
    pub fn new(channels: Vec<ChannelConfig>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_title = HashMap::new();
        for channel in channels {
            by_title.insert(channel.page_name.to_lowercase(), channel.clone());
            by_id.insert(channel.chat_id, channel);
        }
        Self { by_id, by_title }
    }

    /// Load a registry from a JSON array of channel configs.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| dealfeed_common::DealfeedError::Config(e.to_string()))?;
        let channels: Vec<ChannelConfig> = serde_json::from_str(&raw)
            .map_err(|e| dealfeed_common::DealfeedError::Config(e.to_string()))?;
        Ok(Self::new(channels))
    }

    /// Chat id first, channel title as a fallback for migrated channels
    /// whose id changed, then the quarantine config.
    pub fn resolve(&self, chat_id: i64, title: Option<&str>) -> Route {
        if let Some(config) = self.by_id.get(&chat_id) {
            return Route {
                config: config.clone(),
                matched: true,
            };
        }
        if let Some(config) = title.and_then(|t| self.by_title.get(&t.to_lowercase())) {
            return Route {
                config: config.clone(),
                matched: true,
            };
        }
        Route {
            config: fallback_config(chat_id),
            matched: false,
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(default_channels())
    }
}

fn fallback_config(chat_id: i64) -> ChannelConfig {
    ChannelConfig {
        chat_id,
        page_name: "Fallback".to_string(),
        page_slug: FALLBACK_PAGE_SLUG.to_string(),
        platform: "unknown".to_string(),
        strategy: AffiliateStrategy::Passthrough,
    }
}

fn cuelinks() -> AffiliateStrategy {
    AffiliateStrategy::RedirectWrapper {
        endpoint: "https://linksredirect.com/".to_string(),
        url_param: "url".to_string(),
        extra: vec![
            ("cid".to_string(), "243942".to_string()),
            ("source".to_string(), "linkkit".to_string()),
        ],
    }
}

fn inrdeals() -> AffiliateStrategy {
    AffiliateStrategy::RedirectWrapper {
        endpoint: "https://inrdeals.com/redirect".to_string(),
        url_param: "url".to_string(),
        extra: vec![("id".to_string(), "sha678089037".to_string())],
    }
}

fn earnkaro() -> AffiliateStrategy {
    AffiliateStrategy::RedirectWrapper {
        endpoint: "https://earnkaro.com/api/redirect".to_string(),
        url_param: "url".to_string(),
        extra: Vec::new(),
    }
}

fn multi() -> AffiliateStrategy {
    AffiliateStrategy::MultiPlatform {
        candidates: vec![cuelinks(), inrdeals(), earnkaro()],
    }
}

/// The monitored channels. A JSON registry file overrides this set.
pub fn default_channels() -> Vec<ChannelConfig> {
    let amazon = AffiliateStrategy::TagInjection {
        params: vec![
            ("tag".to_string(), "pickntrust03-21".to_string()),
            ("linkCode".to_string(), "as2".to_string()),
            ("camp".to_string(), "1789".to_string()),
            ("creative".to_string(), "9325".to_string()),
        ],
    };

    vec![
        ChannelConfig {
            chat_id: -1002955338551,
            page_name: "Prime Picks".to_string(),
            page_slug: "prime-picks".to_string(),
            platform: "amazon".to_string(),
            strategy: amazon,
        },
        ChannelConfig {
            chat_id: -1002982344997,
            page_name: "Cue Picks".to_string(),
            page_slug: "cue-picks".to_string(),
            platform: "cuelinks".to_string(),
            strategy: cuelinks(),
        },
        ChannelConfig {
            chat_id: -1003017626269,
            page_name: "Value Picks".to_string(),
            page_slug: "value-picks".to_string(),
            platform: "earnkaro".to_string(),
            strategy: earnkaro(),
        },
        ChannelConfig {
            chat_id: -1002981205504,
            page_name: "Click Picks".to_string(),
            page_slug: "click-picks".to_string(),
            platform: "multiple".to_string(),
            strategy: multi(),
        },
        ChannelConfig {
            chat_id: -1002902496654,
            page_name: "Global Picks".to_string(),
            page_slug: "global-picks".to_string(),
            platform: "multiple".to_string(),
            strategy: multi(),
        },
        ChannelConfig {
            chat_id: -1003047967930,
            page_name: "Travel Picks".to_string(),
            page_slug: "travel-picks".to_string(),
            platform: "multiple".to_string(),
            strategy: multi(),
        },
        ChannelConfig {
            chat_id: -1003029983162,
            page_name: "Deals Hub".to_string(),
            page_slug: "deals-hub".to_string(),
            platform: "inrdeals".to_string(),
            strategy: inrdeals(),
        },
        // Loot Box posts pre-tagged deodap links; they must survive verbatim.
        ChannelConfig {
            chat_id: -1002991047787,
            page_name: "Loot Box".to_string(),
            page_slug: "loot-box".to_string(),
            platform: "deodap".to_string(),
            strategy: AffiliateStrategy::Passthrough,
        },
    ]
}
