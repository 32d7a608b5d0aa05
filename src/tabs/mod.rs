pub mod store;

pub use store::TabSessionStore;
