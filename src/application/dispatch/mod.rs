pub mod command_registry;
pub mod dispatcher;

pub use command_registry::CommandRegistry;
pub use dispatcher::CommandDispatcher;
