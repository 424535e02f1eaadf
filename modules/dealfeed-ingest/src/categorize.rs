//! Keyword-driven categorization: channel priors plus content analysis
//! decide the item's flags, category, display pages, and a confidence
//! score for operators reviewing automated inserts.

const FEATURED_KEYWORDS: &[&str] = &[
    "premium", "exclusive", "limited", "special offer", "bestseller", "top rated",
    "editor choice", "recommended", "award winning", "featured", "trending", "popular",
    "hot deal", "must have", "top pick", "curated", "handpicked",
];

const SERVICE_KEYWORDS: &[&str] = &[
    "service", "subscription", "plan", "membership", "account", "access", "streaming",
    "cloud", "hosting", "vpn", "insurance", "banking", "credit card", "loan", "investment",
    "trading", "consultation", "support", "maintenance", "warranty", "protection", "security",
];

const AI_APP_KEYWORDS: &[&str] = &[
    "ai", "artificial intelligence", "machine learning", "ml", "neural", "smart",
    "intelligent", "automated", "bot", "assistant", "chatbot", "app", "application",
    "software", "tool", "platform", "saas", "mobile app", "web app", "desktop app",
    "chrome extension", "plugin", "addon", "widget", "api", "sdk",
];

struct CategoryMapping {
    keywords: &'static [&'static str],
    category: &'static str,
    priority: u32,
}

const SERVICE_CATEGORIES: &[CategoryMapping] = &[
    CategoryMapping {
        keywords: &["credit card", "banking", "loan", "finance", "investment", "trading", "cryptocurrency"],
        category: "Financial Services",
        priority: 10,
    },
    CategoryMapping {
        keywords: &["streaming", "netflix", "spotify", "music", "video", "entertainment", "subscription"],
        category: "Entertainment Services",
        priority: 9,
    },
    CategoryMapping {
        keywords: &["cloud", "storage", "hosting", "server", "database", "backup", "sync"],
        category: "Cloud Services",
        priority: 9,
    },
    CategoryMapping {
        keywords: &["vpn", "security", "antivirus", "protection", "privacy", "cybersecurity"],
        category: "Security Services",
        priority: 9,
    },
    CategoryMapping {
        keywords: &["insurance", "health", "life", "auto", "home", "travel", "coverage"],
        category: "Insurance Services",
        priority: 8,
    },
    CategoryMapping {
        keywords: &["marketing", "seo", "advertising", "social media", "email marketing", "analytics"],
        category: "Marketing Services",
        priority: 8,
    },
    CategoryMapping {
        keywords: &["education", "course", "training", "certification", "learning", "tutorial"],
        category: "Education Services",
        priority: 7,
    },
];

const AI_APP_CATEGORIES: &[CategoryMapping] = &[
    CategoryMapping {
        keywords: &["ai writing", "content generation", "copywriting", "text generator", "gpt"],
        category: "AI Writing Tools",
        priority: 15,
    },
    CategoryMapping {
        keywords: &["ai image", "image generation", "ai art", "photo editing", "ai photo"],
        category: "AI Image Tools",
        priority: 14,
    },
    CategoryMapping {
        keywords: &["chatbot", "ai assistant", "virtual assistant", "conversational ai"],
        category: "AI Assistants",
        priority: 14,
    },
    CategoryMapping {
        keywords: &["productivity", "task management", "project management", "organization"],
        category: "Productivity Apps",
        priority: 12,
    },
    CategoryMapping {
        keywords: &["design", "graphics", "ui", "ux", "creative", "figma", "sketch"],
        category: "Design Apps",
        priority: 11,
    },
    CategoryMapping {
        keywords: &["developer", "coding", "programming", "api", "sdk", "development"],
        category: "Developer Tools",
        priority: 11,
    },
    CategoryMapping {
        keywords: &["business", "crm", "sales", "analytics", "dashboard", "reporting"],
        category: "Business Apps",
        priority: 10,
    },
    CategoryMapping {
        keywords: &["mobile app", "ios", "android", "smartphone", "tablet"],
        category: "Mobile Apps",
        priority: 9,
    },
];

/// Channels whose audience implies the flags before any content analysis.
const FEATURED_CHANNELS: &[&str] = &[
    "prime-picks",
    "cue-picks",
    "value-picks",
    "click-picks",
    "global-picks",
];
const SERVICE_CHANNELS: &[&str] = &["deals-hub", "travel-picks"];
const NEUTRAL_CHANNELS: &[&str] = &["loot-box"];

const CHANNEL_CONFIDENCE: u32 = 30;
const FEATURED_WEIGHT: u32 = 5;
const SERVICE_WEIGHT: u32 = 8;
const AI_APP_WEIGHT: u32 = 10;
const PLATFORM_APP_CONFIDENCE: u32 = 15;
const MAX_CONFIDENCE: u32 = 100;

/// A service needs more than one keyword hit; single hits ("plan",
/// "support") are everywhere in product copy.
const MIN_SERVICE_HITS: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Categorization {
    pub is_featured: bool,
    pub is_service: bool,
    pub is_ai_app: bool,
    pub category: String,
    pub display_pages: Vec<String>,
    pub confidence: u32,
}

pub fn categorize(title: &str, description: &str, page_slug: &str, platform: &str) -> Categorization {
    let text = format!("{} {}", title, description).to_lowercase();
    let slug = dealfeed_common::normalize_slug(page_slug);

    let mut is_featured = FEATURED_CHANNELS.contains(&slug.as_str());
    let mut is_service = SERVICE_CHANNELS.contains(&slug.as_str());
    let mut is_ai_app = false;

    let mut confidence: u32 = 0;
    if is_featured || is_service || NEUTRAL_CHANNELS.contains(&slug.as_str()) {
        confidence += CHANNEL_CONFIDENCE;
    }

    let featured_hits = hits(&text, FEATURED_KEYWORDS);
    if featured_hits > 0 {
        is_featured = true;
        confidence += featured_hits * FEATURED_WEIGHT;
    }

    let service_hits = hits(&text, SERVICE_KEYWORDS);
    if service_hits >= MIN_SERVICE_HITS {
        is_service = true;
        confidence += service_hits * SERVICE_WEIGHT;
    }

    let ai_app_hits = hits(&text, AI_APP_KEYWORDS);
    if ai_app_hits > 0 {
        is_ai_app = true;
        confidence += ai_app_hits * AI_APP_WEIGHT;
    }

    let category = if is_ai_app {
        best_match(&text, AI_APP_CATEGORIES).unwrap_or("AI & Apps")
    } else if is_service {
        best_match(&text, SERVICE_CATEGORIES).unwrap_or("Services")
    } else if is_featured {
        "Featured Products"
    } else {
        "General"
    }
    .to_string();

    // The platform label can flip the app flag, but the category above
    // already settled; an "app" platform does not retarget the category.
    let platform_lower = platform.to_lowercase();
    if platform_lower.contains("app") || platform_lower.contains("mobile") {
        is_ai_app = true;
        confidence += PLATFORM_APP_CONFIDENCE;
    }

    // Items always land on home and on their channel's own page, plus
    // whatever the flags add. Deduped, insertion order kept.
    let mut display_pages = vec!["home".to_string()];
    let mut add = |page: &str| {
        if !page.is_empty() && !display_pages.iter().any(|p| p == page) {
            display_pages.push(page.to_string());
        }
    };
    add(&slug);
    if is_featured {
        add("top-picks");
        add("featured");
    }
    if is_service {
        add("services");
    }
    if is_ai_app {
        add("apps-ai-apps");
        add("apps");
    }

    Categorization {
        is_featured,
        is_service,
        is_ai_app,
        category,
        display_pages,
        confidence: confidence.min(MAX_CONFIDENCE),
    }
}

fn hits(text: &str, keywords: &[&str]) -> u32 {
    keywords.iter().filter(|k| contains_keyword(text, k)).count() as u32
}

/// Substring hit gated on word boundaries: "bot" must not fire inside
/// "bottle", nor "ai" inside "chair". Keywords may span multiple words.
fn contains_keyword(text: &str, keyword: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = text[from..].find(keyword) {
        let start = from + pos;
        let end = start + keyword.len();
        let clear_before = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let clear_after = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if clear_before && clear_after {
            return true;
        }
        from = end;
    }
    false
}

fn best_match(text: &str, categories: &[CategoryMapping]) -> Option<&'static str> {
    let mut best: Option<&'static str> = None;
    let mut best_score = 0u32;
    for mapping in categories {
        let score = mapping
            .keywords
            .iter()
            .filter(|k| contains_keyword(text, k))
            .count() as u32
            * mapping.priority;
        if score > best_score {
            best_score = score;
            best = Some(mapping.category);
        }
    }
    best
}
