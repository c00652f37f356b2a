pub mod annotation;
pub mod clock;
pub mod engine;
pub mod event_source;
pub mod gesture;
pub mod notification;
pub mod position;
pub mod prefetch;
pub mod reader;
pub mod replay;
pub mod session;
pub mod settings;
pub mod store;
pub mod visibility;

pub use clock::{Scheduler, Timestamp};
pub use gesture::{GestureConfig, GestureEvent, GestureInput, GestureRouter};
pub use reader::{Reader, ReaderCommand, ReaderEvent};
pub use session::{SelectionPrompt, SelectionSession, SessionError};
pub use settings::Settings;
