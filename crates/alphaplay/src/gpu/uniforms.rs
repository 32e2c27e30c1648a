use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindingResource, Buffer,
    Device, Queue, Sampler, TextureView,
};

/// Quad uniforms packed for GPU consumption (48 bytes).
/// Must be kept in sync with the WGSL `QuadUniforms` struct.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct QuadUniforms {
    /// Per-component position scale; dpr compensation lives here.
    pub scale: [f32; 4],
    /// Offset from a color texel to its mask texel.
    pub stencil_offset: [f32; 2],
    /// Clip-space translation applied after scaling.
    pub translate: [f32; 2],
    /// 1.0 when the surface composites premultiplied color, 0.0 for straight alpha.
    pub premultiply: f32,
    _pad: [f32; 3],
}

impl QuadUniforms {
    pub fn new(scale: [f32; 4], stencil_offset: [f32; 2]) -> Self {
        Self {
            scale,
            stencil_offset,
            translate: [0.0, 0.0],
            premultiply: 1.0,
            _pad: [0.0; 3],
        }
    }

    pub fn with_scale(self, scale: [f32; 4]) -> Self {
        Self { scale, ..self }
    }

    /// Replace the x/y scale and the translation, keeping everything else.
    pub fn with_transform(self, scale: [f32; 2], translate: [f32; 2]) -> Self {
        Self {
            scale: [scale[0], scale[1], self.scale[2], self.scale[3]],
            translate,
            ..self
        }
    }

    pub fn with_premultiply(self, premultiply: bool) -> Self {
        Self {
            premultiply: if premultiply { 1.0 } else { 0.0 },
            ..self
        }
    }
}

pub struct UniformBuffer {
    pub buffer: Buffer,
}

impl UniformBuffer {
    pub fn new(device: &Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("alphaplay-uniforms"),
            size: std::mem::size_of::<QuadUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer }
    }

    pub fn update(&self, queue: &Queue, uniforms: &QuadUniforms) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Bind group with uniform buffer + frame texture + sampler.
    pub fn create_bind_group(
        &self,
        device: &Device,
        layout: &BindGroupLayout,
        frame_view: &TextureView,
        frame_sampler: &Sampler,
    ) -> BindGroup {
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("alphaplay-bind-group"),
            layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: self.buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(frame_view),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Sampler(frame_sampler),
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_uniforms_size_48() {
        // WGSL rounds the struct up to its 16-byte alignment.
        assert_eq!(std::mem::size_of::<QuadUniforms>(), 48);
    }

    #[test]
    fn new_has_no_translation() {
        let u = QuadUniforms::new([0.5, 0.5, 0.0, 1.0], [0.0, -0.5]);
        assert_eq!(u.translate, [0.0, 0.0]);
        assert_eq!(u.premultiply, 1.0);
        let moved = u.with_transform([1.0, 2.0], [0.25, -0.25]);
        assert_eq!(moved.scale, [1.0, 2.0, 0.0, 1.0]);
        assert_eq!(moved.translate, [0.25, -0.25]);
        assert_eq!(moved.stencil_offset, [0.0, -0.5]);
        assert_eq!(u.with_premultiply(false).premultiply, 0.0);
    }
}
