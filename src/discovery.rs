pub mod story_discovery;
pub mod types;

pub use story_discovery::StoryDiscovery;
pub use types::Story;
