use serde::{Deserialize, Serialize};

/// What to make and for whom. The brief is the attempt-0 prompt; topic and
/// audience give the critic its review context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub topic: String,
    pub audience: String,
    pub brief: String,
}

impl TaskSpec {
    pub fn new(
        topic: impl Into<String>,
        audience: impl Into<String>,
        brief: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            audience: audience.into(),
            brief: brief.into(),
        }
    }
}
