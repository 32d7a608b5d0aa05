pub mod bus;
pub mod controller;
pub mod listener;

pub use bus::{EventBus, ListenerId, Subscription};
pub use controller::{TabTelemetryController, TelemetryDeps};
pub use listener::EventListener;
