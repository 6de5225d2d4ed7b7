mod dom;
mod resolver;
mod snapshot;

pub use dom::{ContextId, PageDom, PageNode};
pub use resolver::{find_by_text, find_for_input};
pub use snapshot::{sanitize, ElementDescriptor, PageSnapshot, SnapshotOptions, Tag};
