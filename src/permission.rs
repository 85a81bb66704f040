use std::collections::HashMap;

/// Permission index: action key to the ordered list of objects accumulated
/// across matching policy rows.
///
/// This is the engine's output artifact and the snapshot persisted by the
/// authorization cache (serialized as plain JSON, e.g. `{"read":["data"]}`).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PermissionIndex {
    entries: HashMap<String, Vec<String>>,
}

impl PermissionIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an object under an action key, initializing the list if absent.
    pub fn grant(&mut self, action: impl Into<String>, object: impl Into<String>) {
        self.entries.entry(action.into()).or_default().push(object.into());
    }

    /// Returns the ordered object list recorded under an action, if any.
    pub fn objects(&self, action: &str) -> Option<&[String]> {
        self.entries.get(action).map(Vec::as_slice)
    }

    /// Returns whether the action grants the object.
    ///
    /// `None` means the action is not present at all, which is what lets the
    /// query surface fall through to its fallback; `Some(false)` means the
    /// action is present but does not cover the object.
    pub fn grants(&self, action: &str, object: &str) -> Option<bool> {
        self.entries
            .get(action)
            .map(|objects| objects.iter().any(|o| o == object))
    }

    /// Iterates over the recorded action keys.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of recorded actions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no actions were recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<HashMap<String, Vec<String>>> for PermissionIndex {
    fn from(entries: HashMap<String, Vec<String>>) -> Self {
        Self { entries }
    }
}

impl FromIterator<(String, Vec<String>)> for PermissionIndex {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
