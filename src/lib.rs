pub mod classifier;
pub mod config;
pub mod console;
pub mod driver;
pub mod error;
pub mod escalation;
pub mod kernel;
pub mod observer;
pub mod services;
pub mod store;

pub use driver::Driver;
pub use kernel::reactor::Reactor;
