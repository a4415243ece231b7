pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod feed;
pub mod subscription;
pub mod view;

pub use channel::MessageChannel;
pub use dispatcher::Dispatcher;
pub use error::ChannelError;
pub use feed::ViewerFeed;
pub use subscription::{CancelHandle, Subscription};
pub use view::ThreadView;
