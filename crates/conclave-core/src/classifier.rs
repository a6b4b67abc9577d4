use crate::types::Category;

// ---------------------------------------------------------------------------
// Keyword table
// ---------------------------------------------------------------------------

/// Keyword sets in priority order: the first category with a match wins.
///
/// Plain alphanumeric keywords match whole words. A trailing `*` marks a
/// stem that matches any word starting with it ("oracle*" matches
/// "oracles"). Keywords containing a space or punctuation match anywhere
/// in the lower-cased text.
pub const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Oracle,
        &["oracle*", "price feed", "data feed", "chainlink", "pyth", "twap"],
    ),
    (
        Category::Identity,
        &[
            "identity",
            "identities",
            "sybil",
            "reputation",
            "kyc",
            "credential*",
            "attestation*",
            "soulbound",
            "proof of personhood",
        ],
    ),
    (
        Category::Privacy,
        &[
            "privacy",
            "private",
            "zero-knowledge",
            "zero knowledge",
            "zk*",
            "confidential*",
            "anonym*",
            "mixer",
            "mixers",
            "encrypt*",
        ],
    ),
    (
        Category::Interoperability,
        &[
            "bridge",
            "bridges",
            "bridging",
            "cross-chain",
            "cross chain",
            "interop*",
            "multichain",
            "multi-chain",
            "rollup*",
            "relayer*",
        ],
    ),
    (
        Category::Governance,
        &[
            "governance",
            "dao",
            "daos",
            "voting",
            "vote",
            "votes",
            "voter*",
            "quorum*",
            "delegat*",
            "treasury",
            "treasuries",
            "council*",
        ],
    ),
    (
        Category::Markets,
        &[
            "market",
            "markets",
            "marketplace*",
            "trading",
            "trade",
            "trades",
            "trader",
            "traders",
            "liquidity",
            "amm",
            "amms",
            "exchange",
            "exchanges",
            "auction*",
            "lending",
            "perpetual*",
            "perps",
            "orderbook*",
            "order book",
        ],
    ),
];

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Lower-cased text split into alphanumeric words.
struct Normalized {
    text: String,
    words: Vec<String>,
}

impl Normalized {
    fn new(input: &str) -> Self {
        let text = input.to_lowercase();
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { text, words }
    }

    fn contains(&self, keyword: &str) -> bool {
        if let Some(stem) = keyword.strip_suffix('*') {
            self.words.iter().any(|w| w.starts_with(stem))
        } else if keyword.chars().all(|c| c.is_alphanumeric()) {
            self.words.iter().any(|w| w == keyword)
        } else {
            self.text.contains(keyword)
        }
    }
}

/// First keyword hit in priority order, with the category it belongs to.
pub fn first_match(text: &str) -> Option<(Category, &'static str)> {
    let normalized = Normalized::new(text);
    KEYWORDS.iter().find_map(|(category, keywords)| {
        keywords
            .iter()
            .find(|k| normalized.contains(k))
            .map(|k| (*category, k.trim_end_matches('*')))
    })
}

/// Assign `text` to a topic category. Total: anything unmatched, including
/// the empty string, is [`Category::Unknown`].
pub fn classify(text: &str) -> Category {
    first_match(text)
        .map(|(category, _)| category)
        .unwrap_or(Category::Unknown)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
