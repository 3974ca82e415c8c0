pub mod article;
pub mod page;
pub mod state;

pub use article::Article;
pub use page::{Cursor, Page, PageWindow};
pub use state::{FeedState, RefreshStatus};
