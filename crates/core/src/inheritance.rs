//! Background inheritance between consecutive scenes.
//!
//! Each scene either keeps the background of the scene before it
//! (INHERITED) or starts a new one (NEW). The decision compares keyword
//! sets, so "Cozy coffee shop interior, different angle" inherits from
//! "A cozy coffee shop interior" even though the text differs.
//!
//! The rolling "current background" is an explicit [`InheritanceChain`]
//! value threaded through [`decide`]. Decisions depend on every earlier
//! decision in the pass, so they must be applied in scene order; the fold
//! in [`decide_all`] is the intended way to run a whole pass.

use std::collections::BTreeSet;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

/// A scene inherits when keyword similarity is strictly greater than this.
pub const SIMILARITY_THRESHOLD: f64 = 0.5;

/// Tokens shorter than this are never keywords.
pub const MIN_KEYWORD_LEN: usize = 3;

/// Common English function words.
const STOPWORDS: &[&str] = &[
    "and", "are", "around", "but", "for", "from", "her", "him", "his", "into", "its", "near",
    "not", "off", "onto", "our", "out", "over", "she", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "under", "was", "were", "where",
    "which", "while", "who", "with", "you", "your",
];

/// Camera and shot vocabulary. These words describe how a scene is framed,
/// not where it takes place, so they never count toward a background match.
const SHOT_TERMS: &[&str] = &[
    "angle", "another", "again", "camera", "close", "closeup", "continued", "cut", "different",
    "establishing", "frame", "medium", "new", "pan", "pov", "reverse", "same", "scene", "shot",
    "tracking", "view", "wide", "zoom",
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The background a decision resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackgroundMetadata {
    /// Synthetic id shared by every scene in the same background run.
    pub id: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub is_inherited: bool,
}

/// The background currently in effect within a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CurrentBackground {
    id: String,
    description: String,
    keywords: BTreeSet<String>,
}

/// Rolling inheritance state for one build pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InheritanceChain {
    current: Option<CurrentBackground>,
    backgrounds_minted: u32,
}

impl InheritanceChain {
    /// The empty state every pass starts from. The first decision made
    /// against it is always NEW.
    pub fn reset() -> Self {
        Self::default()
    }

    /// Description of the background currently in effect, if any.
    pub fn current_description(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.description.as_str())
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Decide whether `description` continues the chain's current background.
///
/// Consumes the chain and returns the updated one alongside the decision.
/// Empty or keyword-less descriptions are always NEW.
pub fn decide(chain: InheritanceChain, description: &str) -> (InheritanceChain, BackgroundMetadata) {
    let keywords = extract_keywords(description);

    if let Some(current) = &chain.current {
        if !keywords.is_empty() && similarity(&current.keywords, &keywords) > SIMILARITY_THRESHOLD {
            let decision = BackgroundMetadata {
                id: current.id.clone(),
                description: current.description.clone(),
                keywords: current.keywords.iter().cloned().collect(),
                is_inherited: true,
            };
            return (chain, decision);
        }
    }

    let minted = chain.backgrounds_minted + 1;
    let current = CurrentBackground {
        id: format!("bg-{minted}"),
        description: description.trim().to_string(),
        keywords,
    };
    let decision = BackgroundMetadata {
        id: current.id.clone(),
        description: current.description.clone(),
        keywords: current.keywords.iter().cloned().collect(),
        is_inherited: false,
    };
    let chain = InheritanceChain {
        current: Some(current),
        backgrounds_minted: minted,
    };
    (chain, decision)
}

/// Run a full pass over scene descriptions in order, starting from a reset
/// chain.
pub fn decide_all<I, S>(descriptions: I) -> Vec<BackgroundMetadata>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    descriptions
        .into_iter()
        .scan(InheritanceChain::reset(), |chain, description| {
            let (next, decision) = decide(std::mem::take(chain), description.as_ref());
            *chain = next;
            Some(decision)
        })
        .collect()
}

/// Normalized keyword set of a scene description.
pub fn extract_keywords(description: &str) -> BTreeSet<String> {
    description
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|t| !STOPWORDS.contains(&t.as_str()) && !SHOT_TERMS.contains(&t.as_str()))
        .collect()
}

/// Jaccard similarity of two keyword sets. Two empty sets score 0.
pub fn similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
