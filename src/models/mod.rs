pub mod event;
pub mod payload;
pub mod session;

pub use event::{BrowserEvent, PageData, SurveyAnswer};
pub use payload::{fields, ExceptionToggle, Payload, PayloadValue, SurveyCode};
pub use session::{TabId, TabPhase, TabSession};
