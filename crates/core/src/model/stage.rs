use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StageGraphError {
    #[error("a lab needs at least one stage")]
    Empty,

    #[error("stage {0} is declared more than once")]
    DuplicateStage(String),

    #[error("stage name cannot be empty")]
    EmptyStageName,
}

//
// ─── STAGE NAME ────────────────────────────────────────────────────────────────
//

/// Name of a stage for labs that declare their stages as data, e.g. `observe`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StageName(String);

impl StageName {
    /// # Errors
    ///
    /// Returns `StageGraphError::EmptyStageName` if the trimmed name is empty.
    pub fn new(raw: impl Into<String>) -> Result<Self, StageGraphError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StageGraphError::EmptyStageName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StageName {
    type Error = StageGraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StageName> for String {
    fn from(name: StageName) -> Self {
        name.0
    }
}

impl fmt::Debug for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── STAGE GRAPH ───────────────────────────────────────────────────────────────
//

/// Ordered list of the stages a lab walks through.
///
/// The graph is a simple directed path: from any stage the only legal moves are
/// staying put (re-entry) or stepping to the immediate successor. Going back
/// requires a reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageGraph<S> {
    stages: Vec<S>,
}

impl<S> StageGraph<S>
where
    S: Clone + PartialEq + fmt::Debug,
{
    /// Build a graph from the lab's declared stage order.
    ///
    /// # Errors
    ///
    /// Returns `StageGraphError::Empty` for an empty list and
    /// `StageGraphError::DuplicateStage` if a stage appears twice.
    pub fn new(stages: impl IntoIterator<Item = S>) -> Result<Self, StageGraphError> {
        let stages: Vec<S> = stages.into_iter().collect();
        if stages.is_empty() {
            return Err(StageGraphError::Empty);
        }
        for (i, stage) in stages.iter().enumerate() {
            if stages[..i].contains(stage) {
                return Err(StageGraphError::DuplicateStage(format!("{stage:?}")));
            }
        }
        Ok(Self { stages })
    }

    /// First declared stage; sessions start and reset here.
    #[must_use]
    pub fn initial(&self) -> &S {
        &self.stages[0]
    }

    /// Last declared stage.
    #[must_use]
    pub fn terminal(&self) -> &S {
        &self.stages[self.stages.len() - 1]
    }

    #[must_use]
    pub fn stages(&self) -> &[S] {
        &self.stages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    #[must_use]
    pub fn position(&self, stage: &S) -> Option<usize> {
        self.stages.iter().position(|s| s == stage)
    }

    #[must_use]
    pub fn contains(&self, stage: &S) -> bool {
        self.position(stage).is_some()
    }

    /// Stage that directly follows `stage`, if any.
    #[must_use]
    pub fn successor(&self, stage: &S) -> Option<&S> {
        self.position(stage).and_then(|i| self.stages.get(i + 1))
    }

    /// True when `to` is `from` itself or its immediate successor.
    #[must_use]
    pub fn is_adjacent(&self, from: &S, to: &S) -> bool {
        match (self.position(from), self.position(to)) {
            (Some(a), Some(b)) => b == a || b == a + 1,
            _ => false,
        }
    }
}

impl StageGraph<StageName> {
    /// Convenience constructor for data-driven labs.
    ///
    /// # Errors
    ///
    /// Returns `StageGraphError` for blank names, duplicates, or an empty list.
    pub fn from_names<I, T>(names: I) -> Result<Self, StageGraphError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let stages = names
            .into_iter()
            .map(StageName::new)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(stages)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
