//! Search over a document: a fast pass over the already-flattened sequence,
//! and a full walk that ignores expansion state and force-expands the
//! ancestors of every hit so results are actually visible.
//!
//! Matches come back in document order (pre-order), the "find in tree"
//! mental model, never relevance-ranked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::EngineError;
use crate::expand::ExpansionState;
use crate::flatten::node_for_value;
use crate::pointer;
use crate::types::{FlattenPolicy, Node};

/// How often a full walk polls its cancel token, in visited values.
pub const CANCEL_POLL_INTERVAL: usize = 256;

/// Cooperative cancellation flag, cloneable across the host's worker
/// boundary. Superseding an in-flight search means cancelling its token so
/// the stale result is discarded instead of racing a newer query.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What to match and how. The default is the plain viewer behavior:
/// case-insensitive substring over keys, scalar values and paths.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub in_keys: bool,
    pub in_values: bool,
    pub in_paths: bool,
    pub case_sensitive: bool,
    pub regex: bool,
    pub whole_word: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            in_keys: true,
            in_values: true,
            in_paths: true,
            case_sensitive: false,
            regex: false,
            whole_word: false,
        }
    }
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Key,
    Value,
    Path,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub node: Node,
    pub match_kind: MatchKind,
    /// The text that matched: the key, the stringified value, or the path.
    pub matched_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub matches: Vec<SearchMatch>,
    pub visited: usize,
    /// Stopped at the match cap; more hits may exist.
    pub truncated: bool,
    /// The token was cancelled mid-walk; results are partial and stale.
    pub canceled: bool,
}

/// Compiled form of a query. Built once per search, applied per candidate
/// string.
struct Matcher {
    needle: String,
    re: Option<Regex>,
    case_sensitive: bool,
    whole_word: bool,
}

impl Matcher {
    fn new(query: &SearchQuery) -> Result<Self, EngineError> {
        let re = if query.regex {
            let re = RegexBuilder::new(&query.text)
                .case_insensitive(!query.case_sensitive)
                .build()
                .map_err(|e| EngineError::BadQuery(e.to_string()))?;
            Some(re)
        } else {
            None
        };
        let needle = if query.case_sensitive {
            query.text.clone()
        } else {
            query.text.to_lowercase()
        };
        Ok(Self {
            needle,
            re,
            case_sensitive: query.case_sensitive,
            whole_word: query.whole_word,
        })
    }

    fn matches(&self, text: &str) -> bool {
        if let Some(re) = &self.re {
            return re.is_match(text);
        }
        let haystack;
        let text = if self.case_sensitive {
            text
        } else {
            haystack = text.to_lowercase();
            &haystack
        };
        if self.whole_word {
            text.split(|c: char| !c.is_alphanumeric())
                .any(|word| word == self.needle)
        } else {
            text.contains(&self.needle)
        }
    }
}

/// Stringified scalar for value matching; `None` for containers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Object(_) | Value::Array(_) => None,
    }
}

/// Mode 1: filter the currently flattened sequence. Fast (no document
/// walk), but blind to collapsed matches. Keeps every match plus the
/// ancestor chain needed to display it, in document order.
pub fn filter_visible(nodes: &[Node], query: &SearchQuery) -> Result<Vec<Node>, EngineError> {
    if query.text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let matcher = Matcher::new(query)?;
    let mut out: Vec<Node> = Vec::new();
    // Containers seen on the path to the current node, with a flag for
    // whether each was already copied to the output.
    let mut ancestors: Vec<(Node, bool)> = Vec::new();

    for node in nodes {
        while let Some((top, _)) = ancestors.last() {
            let is_root = top.pointer.is_empty();
            let under = is_root || node.pointer.starts_with(&format!("{}/", top.pointer));
            if under {
                break;
            }
            ancestors.pop();
        }

        let hit = !node.kind.is_synthetic() && node_matches(node, query, &matcher);
        if hit {
            for (anc, emitted) in ancestors.iter_mut() {
                if !*emitted {
                    out.push(anc.clone());
                    *emitted = true;
                }
            }
            out.push(node.clone());
        }
        if node.expandable {
            ancestors.push((node.clone(), hit));
        }
    }
    Ok(out)
}

fn node_matches(node: &Node, query: &SearchQuery, matcher: &Matcher) -> bool {
    if query.in_keys {
        if let Some(key) = &node.key {
            if matcher.matches(key) {
                return true;
            }
        }
    }
    if query.in_values && !node.kind.is_container() {
        if let Some(v) = &node.value {
            if let Some(text) = scalar_text(v) {
                if matcher.matches(&text) {
                    return true;
                }
            }
        }
    }
    if query.in_paths && matcher.matches(&node.pointer) {
        return true;
    }
    false
}

/// Mode 2: walk the whole value in document order, irrespective of
/// expansion state. Every hit force-expands its ancestor chain into
/// `expansion` so results are visible on the next flatten. Bounded by the
/// policy's `max_total_nodes` as a match cap and cancellable via `cancel`.
pub fn search_full(
    value: &Value,
    query: &SearchQuery,
    expansion: &mut ExpansionState,
    policy: &FlattenPolicy,
    cancel: &CancelToken,
) -> Result<SearchOutcome, EngineError> {
    if query.text.trim().is_empty() {
        return Ok(SearchOutcome::default());
    }
    let matcher = Matcher::new(query)?;
    let mut walk = FullWalk {
        query,
        matcher,
        expansion,
        cancel,
        max_matches: policy.max_total_nodes,
        outcome: SearchOutcome::default(),
    };
    walk.visit(value, String::new(), None, 0);
    let outcome = walk.outcome;
    if outcome.canceled {
        debug!(visited = outcome.visited, "full search cancelled");
    }
    Ok(outcome)
}

struct FullWalk<'a> {
    query: &'a SearchQuery,
    matcher: Matcher,
    expansion: &'a mut ExpansionState,
    cancel: &'a CancelToken,
    max_matches: usize,
    outcome: SearchOutcome,
}

impl FullWalk<'_> {
    fn done(&self) -> bool {
        self.outcome.canceled || self.outcome.truncated
    }

    fn record(&mut self, m: SearchMatch) {
        if let Some(parent) = pointer::parent(&m.node.pointer) {
            let parent = parent.to_string();
            self.expansion.expand_with_ancestors(&parent);
        }
        self.outcome.matches.push(m);
        if self.outcome.matches.len() >= self.max_matches {
            self.outcome.truncated = true;
        }
    }

    fn visit(&mut self, value: &Value, ptr: String, key: Option<String>, depth: usize) {
        if self.done() {
            return;
        }
        self.outcome.visited += 1;
        if self.outcome.visited % CANCEL_POLL_INTERVAL == 0 && self.cancel.is_canceled() {
            self.outcome.canceled = true;
            return;
        }

        if self.query.in_keys {
            if let Some(k) = &key {
                if self.matcher.matches(k) {
                    self.record(SearchMatch {
                        node: node_for_value(ptr.clone(), key.clone(), value, depth),
                        match_kind: MatchKind::Key,
                        matched_text: k.clone(),
                        context: None,
                    });
                }
            }
        }
        if !self.done() && self.query.in_values {
            if let Some(text) = scalar_text(value) {
                if self.matcher.matches(&text) {
                    let context = key.as_ref().map(|k| format!("in key: {k}"));
                    self.record(SearchMatch {
                        node: node_for_value(ptr.clone(), key.clone(), value, depth),
                        match_kind: MatchKind::Value,
                        matched_text: text,
                        context,
                    });
                }
            }
        }
        if !self.done() && self.query.in_paths && !ptr.is_empty() && self.matcher.matches(&ptr) {
            self.record(SearchMatch {
                node: node_for_value(ptr.clone(), key.clone(), value, depth),
                match_kind: MatchKind::Path,
                matched_text: ptr.clone(),
                context: None,
            });
        }

        match value {
            Value::Object(map) => {
                for (k, child) in map.iter() {
                    if self.done() {
                        return;
                    }
                    self.visit(child, pointer::join(&ptr, k), Some(k.clone()), depth + 1);
                }
            }
            Value::Array(arr) => {
                for (i, child) in arr.iter().enumerate() {
                    if self.done() {
                        return;
                    }
                    self.visit(child, pointer::join_index(&ptr, i), Some(i.to_string()), depth + 1);
                }
            }
            _ => {}
        }
    }
}
