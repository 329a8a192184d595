//! Method-level facts read by strategy execution predicates.

/// Facts about the method being compiled. Set at IL generation time;
/// predicates only ever read them.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    /// Conservative: true if the method may contain loops.
    pub may_have_loops: bool,
    pub has_news: bool,
    pub may_contain_monitors: bool,
    pub has_method_handle_invokes: bool,
    pub has_escape_analysis_opportunities: bool,
    pub has_vector_api: bool,
}

impl MethodInfo {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            may_have_loops: false,
            has_news: false,
            may_contain_monitors: false,
            has_method_handle_invokes: false,
            has_escape_analysis_opportunities: false,
            has_vector_api: false,
        }
    }
}
