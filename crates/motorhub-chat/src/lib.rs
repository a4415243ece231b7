pub mod blocking;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod report;
pub mod stats;

pub use blocking::BlockingPolicy;
pub use coordinator::{ChatCoordinator, FileDraft};
pub use error::ChatError;
pub use notify::{Notifier, NullNotifier, TracingNotifier};
pub use report::{ModerationReportBuilder, ThreadReader};
pub use stats::{ChatStats, ChatStatsSnapshot};
