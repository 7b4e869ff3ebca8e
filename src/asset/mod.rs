pub mod cache;
pub mod handle;

pub use cache::AssetCache;
pub use handle::Handle;
