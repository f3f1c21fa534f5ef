#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod labs;
pub mod progress_service;

pub use learn_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, LabDefinitionError, LabError, ProgressServiceError};
pub use labs::{
    LabDefinition, LabDefinitionDraft, LabRunner, NarrationPacer, QuizSubmission,
};
pub use progress_service::ProgressService;
