/// Default key namespace.
pub const DEFAULT_NAMESPACE: &str = "/snowflake";

/// Maps a worker slot to its registry key: `"{namespace}/worker/{slot}"`.
///
/// ```
/// use snowlease::WorkerKeyFormat;
///
/// assert_eq!(WorkerKeyFormat::default().key(3), "/snowflake/worker/3");
/// assert_eq!(WorkerKeyFormat::new("/billing/").key(0), "/billing/worker/0");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerKeyFormat {
    namespace: String,
}

impl Default for WorkerKeyFormat {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl WorkerKeyFormat {
    /// Trailing slashes in `namespace` are dropped.
    pub fn new(namespace: impl Into<String>) -> Self {
        let mut namespace = namespace.into();
        while namespace.ends_with('/') {
            namespace.pop();
        }
        Self { namespace }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self, slot: u64) -> String {
        format!("{}/worker/{slot}", self.namespace)
    }
}
