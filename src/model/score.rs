use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFactors {
    pub severity: u32,
    pub staleness: u32,
    pub age: u32,
    pub license: u32,
}

impl ScoreFactors {
    pub fn raw(&self) -> u32 {
        self.severity + self.staleness + self.age + self.license
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub package: String,
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    /// Average per-dependency risk scaled by 10, always within `0..=100`.
    pub total: u8,
    pub factors: ScoreFactors,
    /// At most five packages, highest contribution first.
    pub top_contributors: Vec<Contributor>,
}
