use std::fmt;
use uuid::Uuid;

/// Identifies one document generation request in log output.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub user_id: Uuid,
    pub estimate_id: i64,
}

impl RequestContext {
    pub fn new(user_id: Uuid, estimate_id: i64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id,
            estimate_id,
        }
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[request={} user={} estimate={}]",
            self.request_id, self.user_id, self.estimate_id
        )
    }
}

/// Lifecycle stages of a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadTemplate,
    Substitute,
    PersistTransient,
    Convert,
    Respond,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadTemplate => "load_template",
            Stage::Substitute => "substitute",
            Stage::PersistTransient => "persist_transient",
            Stage::Convert => "convert",
            Stage::Respond => "respond",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}
