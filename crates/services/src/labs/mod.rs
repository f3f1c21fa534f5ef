mod definition;
mod narration;
mod runner;

pub use definition::{LabDefinition, LabDefinitionDraft};
pub use narration::NarrationPacer;
pub use runner::{LabRunner, QuizSubmission};
