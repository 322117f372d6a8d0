use render_protocol::Viewport;

use crate::surface::{SurfaceBackend, SurfaceDescriptor, ViewportTarget};

pub const ATLAS_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const ATLAS_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// GPU images backing one atlas. Depth-mode atlases carry no color image.
#[derive(Debug)]
pub struct AtlasTextures {
    color: Option<(wgpu::Texture, wgpu::TextureView)>,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

impl AtlasTextures {
    pub fn color_texture(&self) -> Option<&wgpu::Texture> {
        self.color.as_ref().map(|(texture, _)| texture)
    }

    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.color.as_ref().map(|(_, view)| view)
    }

    pub fn depth_texture(&self) -> &wgpu::Texture {
        &self.depth
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// Opens a pass over the whole atlas that preserves the other slots' contents.
    ///
    /// Narrow it to one slot with [`crate::AtlasSurface::bind_slot`].
    pub fn begin_pass<'encoder>(
        &self,
        encoder: &'encoder mut wgpu::CommandEncoder,
        label: Option<&str>,
    ) -> wgpu::RenderPass<'encoder> {
        let color_attachments: Vec<_> = self
            .color_view()
            .into_iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label,
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
    }
}

fn create_atlas_texture(
    device: &wgpu::Device,
    label: Option<&str>,
    dimension: u32,
    format: wgpu::TextureFormat,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label,
        size: wgpu::Extent3d {
            width: dimension,
            height: dimension,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

impl SurfaceBackend for wgpu::Device {
    type Surface = AtlasTextures;

    fn create_surface(&self, descriptor: &SurfaceDescriptor<'_>) -> AtlasTextures {
        let color = descriptor.mode.has_color().then(|| {
            create_atlas_texture(
                self,
                descriptor.label,
                descriptor.dimension,
                ATLAS_COLOR_FORMAT,
            )
        });
        let (depth, depth_view) = create_atlas_texture(
            self,
            descriptor.label,
            descriptor.dimension,
            ATLAS_DEPTH_FORMAT,
        );
        AtlasTextures {
            color,
            depth,
            depth_view,
        }
    }
}

impl ViewportTarget for wgpu::RenderPass<'_> {
    fn set_slot_viewport(&mut self, viewport: Viewport) {
        self.set_viewport(
            viewport.origin_x as f32,
            viewport.origin_y as f32,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );
        self.set_scissor_rect(
            viewport.origin_x,
            viewport.origin_y,
            viewport.width,
            viewport.height,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AtlasConfig, AtlasSurface};

    fn try_create_device_queue() -> Option<(wgpu::Device, wgpu::Queue)> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .ok()?;
            let limits = adapter.limits();
            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("slot_atlas tests"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    experimental_features: wgpu::ExperimentalFeatures::disabled(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                })
                .await
                .ok()
        })
    }

    #[test]
    fn depth_atlas_has_no_color_image() {
        let Some((device, queue)) = try_create_device_queue() else {
            eprintln!("skipping: no wgpu adapter available");
            return;
        };
        let mut atlas = AtlasSurface::new(&device, AtlasConfig::depth(256)).unwrap();
        assert!(atlas.surface().color_texture().is_none());
        assert_eq!(atlas.surface().depth_texture().format(), ATLAS_DEPTH_FORMAT);
        assert_eq!(atlas.surface().depth_texture().width(), 256);

        let handle = atlas.alloc(64).unwrap();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("slot_atlas bind test"),
        });
        {
            let mut pass = atlas.surface().begin_pass(&mut encoder, Some("slot"));
            assert!(atlas.bind_slot(handle, &mut pass));
        }
        queue.submit(Some(encoder.finish()));
    }

    #[test]
    fn color_atlas_allocates_both_images() {
        let Some((device, _queue)) = try_create_device_queue() else {
            eprintln!("skipping: no wgpu adapter available");
            return;
        };
        let atlas = AtlasSurface::new(&device, AtlasConfig::color(128)).unwrap();
        let color = atlas.surface().color_texture().unwrap();
        assert_eq!(color.format(), ATLAS_COLOR_FORMAT);
        assert_eq!(color.height(), 128);
        assert!(atlas.surface().color_view().is_some());
    }
}
