pub mod renew;
pub mod serve;
mod wiring;

pub use renew::RenewCommand;
pub use serve::ServeCommand;
