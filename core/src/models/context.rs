/// Ambient values every reservation or job-handler operation must be
/// traceable to. Threaded explicitly through service call signatures
/// rather than stashed in a process global, per the engine's "no globals"
/// rule — callers at the HTTP boundary build one from the authenticated
/// request, and the worker pool rebuilds one from a dispatched job's
/// carried metadata.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: String,
    pub seller_id: String,
    pub correlation_id: String,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, seller_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            seller_id: seller_id.into(),
            correlation_id: correlation_id.into(),
        }
    }

    /// Seller id parsed as the bigint identifiers the ledger keys on.
    pub fn seller_id_i64(&self) -> crate::Result<i64> {
        self.seller_id
            .parse()
            .map_err(|_| inv_shared::Error::Validation("seller_id must be numeric".to_string()))
    }
}
