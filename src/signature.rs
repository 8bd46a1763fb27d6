/// Structural signatures of a window's tab list
///
/// A signature has one line per tab, in tab order:
/// `<parentIndex>,<cookieStoreId>,<incognito>,<pinned>`, where `parentIndex`
/// is the zero-based position of the parent in the same list or `-1`.
/// Indices instead of raw ids keep signatures comparable across sessions,
/// since tab ids are reassigned when the browser restarts.
use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::markup::{self, INCOGNITO_CLASS, PINNED_CLASS};
use crate::tab_data::{DEFAULT_COOKIE_STORE_ID, TabId, TabRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature(String);

impl Signature {
    pub fn from_lines<I, S>(lines: I) -> Signature
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<String> = lines.into_iter().map(|l| l.as_ref().to_string()).collect();
        Signature(lines.join("\n"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn lines(&self) -> Vec<&str> {
        if self.0.is_empty() {
            Vec::new()
        } else {
            self.0.split('\n').collect()
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines().len()
    }

    /// Drop the first `ignore_count` lines
    pub fn trim(&self, ignore_count: usize) -> Signature {
        if ignore_count == 0 {
            return self.clone();
        }
        Signature::from_lines(self.lines().into_iter().skip(ignore_count))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Signature {
    fn from(value: &str) -> Self {
        Signature(value.to_string())
    }
}

impl From<String> for Signature {
    fn from(value: String) -> Self {
        Signature(value)
    }
}

fn signature_line(parent_index: Option<usize>, cookie_store_id: &str, incognito: bool, pinned: bool) -> String {
    let parent = parent_index.map_or(-1, |i| i as i64);
    format!("{parent},{cookie_store_id},{incognito},{pinned}")
}

/// Map each id to its first position in the list
fn index_ids(ids: impl Iterator<Item = Option<TabId>>) -> HashMap<TabId, usize> {
    ids.enumerate()
        .fold(HashMap::new(), |mut index, (position, id)| {
            if let Some(id) = id {
                index.entry(id).or_insert(position);
            }
            index
        })
}

/// Signature of the authoritative tab list
pub fn derive_signature(tabs: &[TabRecord]) -> Signature {
    let index = index_ids(tabs.iter().map(|tab| Some(tab.id)));

    Signature::from_lines(tabs.iter().map(|tab| {
        let parent = tab.parent_id.and_then(|id| index.get(&id).copied());
        signature_line(parent, &markup::cookie_store_token(&tab.cookie_store_id), tab.incognito, tab.pinned)
    }))
}

/// Signature of the tabs stored in a cache blob.
///
/// Malformed ids or parent references resolve to `-1`, and a missing
/// contextual identity class to the default cookie store.
pub fn signature_from_markup(markup: &str) -> Signature {
    let nodes = markup::parse_fragment(markup);
    let items = markup::item_elements(&nodes);
    let index = index_ids(items.iter().map(|item| item.tab_id()));

    Signature::from_lines(items.iter().map(|item| {
        let parent = item.parent_tab_id().and_then(|id| index.get(&id).copied());
        signature_line(
            parent,
            item.cookie_store_id().unwrap_or(DEFAULT_COOKIE_STORE_ID),
            item.has_class(INCOGNITO_CLASS),
            item.has_class(PINNED_CLASS),
        )
    }))
}

pub fn trim_signature(signature: &Signature, ignore_count: usize) -> Signature {
    signature.trim(ignore_count)
}

/// How a cached signature lines up with the actual one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMatch {
    /// Same tabs, same order
    Full,
    /// The cache covers the first `reusable` tabs; later tabs are new
    Prefix { reusable: usize },
    /// The cache covers the trailing tabs after the first `leading` ones
    Suffix { leading: usize },
    Mismatch,
}

impl SignatureMatch {
    pub fn is_match(&self) -> bool {
        !matches!(self, SignatureMatch::Mismatch)
    }
}

/// Compare signatures line by line. An empty signature never matches.
pub fn match_signatures(cached: &Signature, actual: &Signature) -> SignatureMatch {
    if cached.is_empty() || actual.is_empty() {
        return SignatureMatch::Mismatch;
    }

    let cached_lines = cached.lines();
    let actual_lines = actual.lines();

    if cached_lines.len() > actual_lines.len() {
        SignatureMatch::Mismatch
    } else if cached_lines == actual_lines {
        SignatureMatch::Full
    } else if actual_lines.starts_with(&cached_lines) {
        SignatureMatch::Prefix { reusable: cached_lines.len() }
    } else if actual_lines.ends_with(&cached_lines) {
        SignatureMatch::Suffix { leading: actual_lines.len() - cached_lines.len() }
    } else {
        SignatureMatch::Mismatch
    }
}

pub fn signatures_compatible(cached: &Signature, actual: &Signature) -> bool {
    match_signatures(cached, actual).is_match()
}

/// Number of leading tabs the cache can supply, if it is usable from the start
pub fn reusable_count(cached: &Signature, actual: &Signature) -> Option<usize> {
    match match_signatures(cached, actual) {
        SignatureMatch::Full => Some(actual.line_count()),
        SignatureMatch::Prefix { reusable } => Some(reusable),
        SignatureMatch::Suffix { .. } | SignatureMatch::Mismatch => None,
    }
}

/// What to hand to the restoration engine for a usable cache
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePlan {
    /// Tabs already present at the head of the window
    pub offset: usize,
    /// Cache markup with the first `offset` items removed
    pub markup: String,
    /// The cache covers tabs `offset..covered`
    pub covered: usize,
}

impl RestorePlan {
    /// Tab records the plan restores, including the already present head
    pub fn records<'a>(&self, tabs: &'a [TabRecord]) -> &'a [TabRecord] {
        &tabs[..self.covered.min(tabs.len())]
    }
}

/// Decide whether and how a cache blob can be restored for `tabs`, given that
/// the first `already_present` tabs are already rendered.
pub fn plan_restoration(markup: &str, tabs: &[TabRecord], already_present: usize) -> Option<RestorePlan> {
    let cached = signature_from_markup(markup).trim(already_present);
    let actual = derive_signature(tabs).trim(already_present);

    let (offset, covered) = match match_signatures(&cached, &actual) {
        SignatureMatch::Full => (already_present, tabs.len()),
        SignatureMatch::Prefix { reusable } => (already_present, already_present + reusable),
        SignatureMatch::Suffix { leading } => (already_present + leading, tabs.len()),
        SignatureMatch::Mismatch => {
            log::debug!("cache signature mismatch:\n{cached}\n---\n{actual}");
            return None;
        }
    };

    Some(RestorePlan {
        offset,
        markup: markup::trim_markup(markup, already_present),
        covered,
    })
}
