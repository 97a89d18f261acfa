use serde::{Deserialize, Serialize};

/// How trustworthy the gathered material looks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credibility {
    Low,
    #[default]
    Medium,
    High,
}

/// A concrete fact pulled from source material: a company, a price, a
/// place. Vague material is what the critic is there to reject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntity {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub detail: String,
}

/// A first-hand account backing the post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCase {
    pub subject: String,
    pub experience: String,
    #[serde(default)]
    pub source: String,
}

/// Research artifact produced by the first loop stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchFindings {
    pub summary: String,
    #[serde(default)]
    pub entities: Vec<SourceEntity>,
    #[serde(default)]
    pub cases: Vec<SourceCase>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub credibility: Credibility,
    #[serde(default)]
    pub data_points: u32,
}

impl ResearchFindings {
    /// Entities plus cases: the count of facts the content stage can
    /// actually cite.
    pub fn usable_facts(&self) -> usize {
        self.entities.len() + self.cases.len()
    }
}
