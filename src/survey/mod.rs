pub mod engine;
pub mod memory;
pub mod prompt;

pub use engine::{should_show, SurveyDecision, SurveyEngine};
pub use memory::AnswerMemory;
pub use prompt::{LogPrompt, SurveyPrompt};
