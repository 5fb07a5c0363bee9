//! One open document and the shared state around it.
//!
//! [`DocumentSession`] owns everything transient for a loaded value: the
//! value itself, its cached [`StructureAnalysis`] (recomputed only when the
//! document is replaced, never per frame), the [`ExpansionState`] and the
//! [`FlattenPolicy`]. [`ViewerState`] is the host-facing wrapper: a lock
//! around the optional current session plus the active search's cancel
//! token. All expansion mutations go through the session; nothing else
//! writes to the set.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use crate::analyze::analyze;
use crate::error::EngineError;
use crate::expand::ExpansionState;
use crate::flatten::{flatten, FlattenResult};
use crate::search::{filter_visible, search_full, CancelToken, SearchOutcome, SearchQuery};
use crate::types::{FlattenPolicy, Node, StructureAnalysis};

/// How many extra children one "load more" click materializes.
pub const LOAD_MORE_PAGE: usize = 200;

pub struct DocumentSession {
    doc: Arc<Value>,
    analysis: StructureAnalysis,
    expansion: ExpansionState,
    policy: FlattenPolicy,
    /// Bumped on every expansion or policy mutation; keys the flatten memo.
    revision: u64,
    flatten_cache: Mutex<Option<(u64, Arc<FlattenResult>)>>,
}

impl DocumentSession {
    /// Analyze the value once and derive the flatten policy from the result.
    pub fn new(doc: Arc<Value>) -> Self {
        let analysis = analyze(&doc);
        let policy = FlattenPolicy::for_analysis(&analysis);
        debug!(
            node_count = analysis.node_count,
            max_depth = analysis.max_depth,
            complexity = ?analysis.complexity,
            "document session opened"
        );
        Self {
            doc,
            analysis,
            expansion: ExpansionState::new(),
            policy,
            revision: 0,
            flatten_cache: Mutex::new(None),
        }
    }

    pub fn value(&self) -> &Arc<Value> {
        &self.doc
    }

    pub fn analysis(&self) -> &StructureAnalysis {
        &self.analysis
    }

    pub fn policy(&self) -> &FlattenPolicy {
        &self.policy
    }

    /// Mutable policy access. Counts as a state change, so any memoized
    /// flatten result is invalidated.
    pub fn policy_mut(&mut self) -> &mut FlattenPolicy {
        self.revision += 1;
        &mut self.policy
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    /// Resolve a pointer in the current document. A pointer the host holds
    /// that no longer resolves means its state is out of sync with ours.
    pub fn node_value(&self, pointer: &str) -> Result<&Value, EngineError> {
        if pointer.is_empty() {
            return Ok(self.doc.as_ref());
        }
        self.doc
            .pointer(pointer)
            .ok_or_else(|| EngineError::InvalidPointer(pointer.to_string()))
    }

    /// Serialized value at `pointer`, for hosts that show or copy raw JSON.
    pub fn value_string(&self, pointer: &str, pretty: bool) -> Result<String, EngineError> {
        let value = self.node_value(pointer)?;
        let out = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        out.map_err(|e| EngineError::Parse(e.to_string()))
    }

    /// Toggle expansion of the container at `pointer`. Errors if the
    /// pointer does not resolve (host/engine desync), returns the new
    /// expansion membership otherwise.
    pub fn toggle(&mut self, pointer: &str) -> Result<bool, EngineError> {
        self.node_value(pointer)?;
        self.revision += 1;
        Ok(self.expansion.toggle(pointer))
    }

    /// Expand everything that fits inside the policy's node budget.
    pub fn expand_all(&mut self, up_to_depth: Option<usize>) {
        self.revision += 1;
        self.expansion
            .expand_all(&self.doc, up_to_depth, self.policy.max_total_nodes);
    }

    pub fn collapse_all(&mut self) {
        self.revision += 1;
        self.expansion.collapse_all();
    }

    /// Flatten with the session's current expansion state and policy.
    /// Memoized on (document, expansion, policy): repeated calls between
    /// state changes reuse the previous pass.
    pub fn flatten(&self) -> Arc<FlattenResult> {
        let mut cache = self.flatten_cache.lock();
        if let Some((revision, cached)) = &*cache {
            if *revision == self.revision {
                return cached.clone();
            }
        }
        let result = Arc::new(flatten(&self.doc, &self.expansion, &self.policy));
        *cache = Some((self.revision, result.clone()));
        result
    }

    /// Materialize the next page of children for one container and
    /// re-flatten. The raised cap is local to that pointer; the rest of the
    /// document keeps its budgets.
    pub fn load_more(&mut self, pointer: &str) -> Result<Arc<FlattenResult>, EngineError> {
        match self.node_value(pointer)? {
            Value::Object(_) | Value::Array(_) => {}
            _ => return Err(EngineError::InvalidPointer(pointer.to_string())),
        }
        self.revision += 1;
        self.policy.raise_children_cap(pointer, LOAD_MORE_PAGE);
        Ok(self.flatten())
    }

    /// Search within the currently flattened sequence only.
    pub fn filter_visible(&self, query: &SearchQuery) -> Result<Vec<Node>, EngineError> {
        filter_visible(&self.flatten().nodes, query)
    }

    /// Full-document search; hits force-expand their ancestors in this
    /// session's expansion state.
    pub fn search_full(
        &mut self,
        query: &SearchQuery,
        cancel: &CancelToken,
    ) -> Result<SearchOutcome, EngineError> {
        self.revision += 1;
        search_full(&self.doc, query, &mut self.expansion, &self.policy, cancel)
    }
}

/// Host-facing shared state: the current session (if any) and the active
/// search token. One instance per viewer.
#[derive(Default)]
pub struct ViewerState {
    session: RwLock<Option<DocumentSession>>,
    active_search: RwLock<CancelToken>,
}

impl ViewerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and load a document. Malformed text is rejected here, at the
    /// boundary; the engine core never sees a malformed value.
    pub fn open_str(&self, text: &str) -> Result<StructureAnalysis, EngineError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| EngineError::Parse(e.to_string()))?;
        Ok(self.open_value(value))
    }

    /// Load an already-parsed document, replacing any current session. The
    /// old session's analysis, expansion state and policy are discarded
    /// with it.
    pub fn open_value(&self, value: Value) -> StructureAnalysis {
        let session = DocumentSession::new(Arc::new(value));
        let analysis = session.analysis().clone();
        *self.session.write() = Some(session);
        analysis
    }

    pub fn close(&self) {
        self.active_search.read().cancel();
        *self.session.write() = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.session.read().is_some()
    }

    /// Run `f` against the current session.
    pub fn with_session<R>(&self, f: impl FnOnce(&DocumentSession) -> R) -> Result<R, EngineError> {
        let guard = self.session.read();
        let session = guard.as_ref().ok_or(EngineError::NoDocument)?;
        Ok(f(session))
    }

    pub fn with_session_mut<R>(
        &self,
        f: impl FnOnce(&mut DocumentSession) -> R,
    ) -> Result<R, EngineError> {
        let mut guard = self.session.write();
        let session = guard.as_mut().ok_or(EngineError::NoDocument)?;
        Ok(f(session))
    }

    /// Cancel any in-flight search and hand out the token for the next one.
    /// The previous search notices at its next poll and discards itself.
    pub fn begin_search(&self) -> CancelToken {
        let mut guard = self.active_search.write();
        guard.cancel();
        *guard = CancelToken::new();
        guard.clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn open_str_rejects_malformed_json() {
        let state = ViewerState::new();
        let err = state.open_str("{not json").unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
        assert!(!state.is_loaded());
    }

    #[test]
    fn no_document_is_a_distinct_error() {
        let state = ViewerState::new();
        let err = state.with_session(|s| s.flatten()).unwrap_err();
        assert!(matches!(err, EngineError::NoDocument));
    }

    #[test]
    fn toggle_unknown_pointer_is_a_contract_violation() {
        let state = ViewerState::new();
        state.open_value(json!({"a": 1}));
        let err = state
            .with_session_mut(|s| s.toggle("/missing"))
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPointer(_)));
    }

    #[test]
    fn replacing_a_document_recomputes_analysis() {
        let state = ViewerState::new();
        let a1 = state.open_value(json!({"a": 1}));
        assert_eq!(a1.node_count, 2);
        let a2 = state.open_value(json!([1, 2, 3]));
        assert_eq!(a2.node_count, 4);
        // Old expansion state went with the old session.
        let expanded = state.with_session(|s| s.expansion().len()).unwrap();
        assert_eq!(expanded, 1);
    }

    #[test]
    fn flatten_is_memoized_until_state_changes() {
        let state = ViewerState::new();
        state.open_value(json!({"a": {"b": 1}}));
        state
            .with_session_mut(|s| {
                let first = s.flatten();
                let again = s.flatten();
                assert!(Arc::ptr_eq(&first, &again));

                s.toggle("/a").unwrap();
                let after = s.flatten();
                assert!(!Arc::ptr_eq(&first, &after));
                assert!(after.nodes.len() > first.nodes.len());
            })
            .unwrap();
    }

    #[test]
    fn begin_search_cancels_the_previous_token() {
        let state = ViewerState::new();
        let first = state.begin_search();
        assert!(!first.is_canceled());
        let second = state.begin_search();
        assert!(first.is_canceled());
        assert!(!second.is_canceled());
    }

    #[test]
    fn load_more_extends_one_container_only() {
        let state = ViewerState::new();
        let items: Vec<_> = (0..500).map(|i| json!(i)).collect();
        state.open_value(json!({"big": items, "other": (0..300).collect::<Vec<i32>>()}));
        state
            .with_session_mut(|s| {
                s.policy_mut().max_children_per_container = 100;
                s.toggle("/big").unwrap();
                s.toggle("/other").unwrap();
                let before = s.flatten();
                let more_before: Vec<usize> =
                    before.nodes.iter().filter_map(|n| n.remaining).collect();
                assert_eq!(more_before, vec![400, 200]);

                let after = s.load_more("/big").unwrap();
                let more_after: Vec<usize> =
                    after.nodes.iter().filter_map(|n| n.remaining).collect();
                // `/big` advanced one page, `/other` untouched.
                assert_eq!(more_after, vec![200, 200]);
            })
            .unwrap();
    }

    #[test]
    fn load_more_on_a_scalar_is_rejected() {
        let state = ViewerState::new();
        state.open_value(json!({"n": 1}));
        let err = state
            .with_session_mut(|s| s.load_more("/n"))
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPointer(_)));
    }

    #[test]
    fn value_string_round_trips_scalars() {
        let state = ViewerState::new();
        state.open_value(json!({"msg": "hi"}));
        let s = state
            .with_session(|s| s.value_string("/msg", false))
            .unwrap()
            .unwrap();
        assert_eq!(s, "\"hi\"");
    }
}
