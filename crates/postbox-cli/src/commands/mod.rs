pub mod attachment;
mod context;
pub mod enqueue;
pub mod queue;
pub mod serve;
pub mod template;

pub use attachment::AttachmentCommand;
pub use enqueue::EnqueueCommand;
pub use queue::{StatsCommand, SweepCommand, UnsentCommand};
pub use serve::ServeCommand;
pub use template::TemplateCommand;
