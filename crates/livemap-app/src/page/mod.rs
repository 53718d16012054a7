pub mod compose;
pub mod layout;
pub mod live;

pub use compose::PageCompositor;
pub use layout::PageLayout;
pub use live::LiveImage;
