//! The dependency array (Component D) and tile allocator (Component I) —
//! the two structures in the runtime that share the lazily-allocated,
//! reference-counted free-list idiom.

pub mod dep_array;
pub mod freelist;
pub mod tile;

pub use dep_array::{DependencyArray, LeafHandle, LocalBounds};
pub use freelist::Freelist;
pub use tile::{TileAllocator, TileBuf};
