//! Square-slot atlas allocation for shadow maps, reflection probes and other
//! render targets that share one large surface.
//!
//! [`SlotAllocator`] hands out power-of-two sub-squares of a power-of-two
//! domain from a quadtree and reclaims the least recently used slot when the
//! domain is full. [`AtlasSurface`] pairs an allocator with the backing
//! surface and turns slot handles into viewports and texture transforms.

mod allocator;
mod config;
#[cfg(feature = "atlas-gpu")]
mod gpu;
mod key;
mod layout;
mod node;
mod surface;

pub use allocator::{SlotAllocError, SlotAllocator};
pub use config::{
    AtlasConfig, AtlasConfigError, DEFAULT_ATLAS_DIMENSION, RenderAtlasesConfig, SurfaceMode,
};
#[cfg(feature = "atlas-gpu")]
pub use gpu::{ATLAS_COLOR_FORMAT, ATLAS_DEPTH_FORMAT, AtlasTextures};
pub use key::{Id, SlotHandle, SlotTag, Stamp, StampTag};
pub use layout::SlotInfo;
pub use surface::{
    AtlasSurface, RenderAtlases, SlotLease, SurfaceBackend, SurfaceDescriptor, ViewportTarget,
};

pub use render_protocol::{TexCoordOffset, TransformMatrix3x3, TransformMatrix4x4, Viewport};

#[cfg(test)]
mod proptests;
