pub mod feed;
pub mod normalizer;
pub mod paths;
pub mod publisher;
pub mod resolver;
pub mod session;

pub use feed::{FeedItem, FeedPage, FeedService};
pub use publisher::{NewShareRequest, PublishError, Publisher, UploadedFile};
pub use resolver::{BucketClass, DisplayResolver, UrlContext};
pub use session::SessionContext;
