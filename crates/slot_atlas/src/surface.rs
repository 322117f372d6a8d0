use log::warn;
use render_protocol::{TexCoordOffset, TransformMatrix3x3, Viewport, ZERO_MATRIX3X3};

use crate::allocator::{SlotAllocError, SlotAllocator};
use crate::config::{AtlasConfig, AtlasConfigError, RenderAtlasesConfig, SurfaceMode};
use crate::key::SlotHandle;
use crate::layout::SlotInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDescriptor<'a> {
    pub label: Option<&'a str>,
    pub dimension: u32,
    pub mode: SurfaceMode,
}

/// Graphics backend that owns the pixels behind an atlas.
pub trait SurfaceBackend {
    type Surface;

    fn create_surface(&self, descriptor: &SurfaceDescriptor<'_>) -> Self::Surface;
}

/// Render target state that can be narrowed to one slot's rectangle.
pub trait ViewportTarget {
    /// Sets both viewport and scissor rectangle.
    fn set_slot_viewport(&mut self, viewport: Viewport);
}

/// Outcome of [`AtlasSurface::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLease {
    pub handle: SlotHandle,
    /// True when the slot was (re)allocated and its contents must be rendered again.
    pub fresh: bool,
}

/// One shared render surface plus the allocator that carves it into slots.
#[derive(Debug)]
pub struct AtlasSurface<S> {
    allocator: SlotAllocator,
    mode: SurfaceMode,
    surface: S,
}

impl<S> AtlasSurface<S> {
    pub fn new<B>(backend: &B, config: AtlasConfig) -> Result<Self, AtlasConfigError>
    where
        B: SurfaceBackend<Surface = S>,
    {
        Self::with_label(backend, config, None)
    }

    pub fn with_label<B>(
        backend: &B,
        config: AtlasConfig,
        label: Option<&str>,
    ) -> Result<Self, AtlasConfigError>
    where
        B: SurfaceBackend<Surface = S>,
    {
        let allocator = SlotAllocator::new(config.dimension)?;
        let surface = backend.create_surface(&SurfaceDescriptor {
            label,
            dimension: config.dimension,
            mode: config.mode,
        });
        Ok(Self {
            allocator,
            mode: config.mode,
            surface,
        })
    }

    pub const fn mode(&self) -> SurfaceMode {
        self.mode
    }

    pub const fn dimension(&self) -> u32 {
        self.allocator.dimension()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn allocator(&self) -> &SlotAllocator {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut SlotAllocator {
        &mut self.allocator
    }

    pub fn alloc(&mut self, size: u32) -> Result<SlotHandle, SlotAllocError> {
        self.allocator.alloc(size)
    }

    pub fn free(&mut self, handle: SlotHandle) -> bool {
        self.allocator.free(handle)
    }

    pub fn refresh(&mut self, handle: SlotHandle) -> Option<SlotHandle> {
        self.allocator.refresh(handle)
    }

    pub fn valid(&self, handle: SlotHandle) -> bool {
        self.allocator.valid(handle)
    }

    pub fn info(&self, handle: SlotHandle) -> Option<SlotInfo> {
        self.allocator.info(handle)
    }

    /// Keeps `previous` alive if it is still live and of the right size,
    /// otherwise allocates a replacement that the caller has to redraw.
    pub fn ensure(
        &mut self,
        previous: Option<SlotHandle>,
        size: u32,
    ) -> Result<SlotLease, SlotAllocError> {
        let rounded = self.allocator.rounded_size(size)?;
        if let Some(handle) = previous {
            let same_size = self
                .allocator
                .info(handle)
                .is_some_and(|info| info.size == rounded);
            if same_size && self.allocator.refresh(handle).is_some() {
                return Ok(SlotLease {
                    handle,
                    fresh: false,
                });
            }
        }
        // the previous slot survives a failed replacement
        let handle = self.allocator.alloc(rounded)?;
        if let Some(stale) = previous {
            self.allocator.free(stale);
        }
        Ok(SlotLease {
            handle,
            fresh: true,
        })
    }

    /// Points `target` at the slot's rectangle. Returns false for unknown handles.
    pub fn bind_slot<T>(&self, handle: SlotHandle, target: &mut T) -> bool
    where
        T: ViewportTarget + ?Sized,
    {
        let Some(info) = self.allocator.info(handle) else {
            warn!("cannot bind atlas slot {handle}: not a live slot");
            return false;
        };
        target.set_slot_viewport(info.viewport());
        true
    }

    /// Zero matrix for unknown handles.
    pub fn tex_coord_transform(&self, handle: SlotHandle) -> TransformMatrix3x3 {
        match self.allocator.info(handle) {
            Some(info) => info.tex_coord_transform(),
            None => {
                warn!("texture transform requested for stale atlas slot {handle}");
                ZERO_MATRIX3X3
            }
        }
    }

    /// All-zero offset for unknown handles.
    pub fn tex_coord_offset(&self, handle: SlotHandle) -> TexCoordOffset {
        match self.allocator.info(handle) {
            Some(info) => info.tex_coord_offset(),
            None => {
                warn!("texture offset requested for stale atlas slot {handle}");
                TexCoordOffset::default()
            }
        }
    }
}

/// The atlases a renderer shares between all lights and probes.
#[derive(Debug)]
pub struct RenderAtlases<S> {
    pub reflections: AtlasSurface<S>,
    pub shadows: AtlasSurface<S>,
    pub irradiance: AtlasSurface<S>,
    pub irradiance_coefficients: AtlasSurface<S>,
}

impl<S> RenderAtlases<S> {
    pub fn new<B>(backend: &B, config: &RenderAtlasesConfig) -> Result<Self, AtlasConfigError>
    where
        B: SurfaceBackend<Surface = S>,
    {
        config.validate()?;
        Ok(Self {
            reflections: AtlasSurface::with_label(
                backend,
                config.reflections,
                Some("atlas.reflections"),
            )?,
            shadows: AtlasSurface::with_label(backend, config.shadows, Some("atlas.shadows"))?,
            irradiance: AtlasSurface::with_label(
                backend,
                config.irradiance,
                Some("atlas.irradiance"),
            )?,
            irradiance_coefficients: AtlasSurface::with_label(
                backend,
                config.irradiance_coefficients,
                Some("atlas.irradiance_coefficients"),
            )?,
        })
    }
}
