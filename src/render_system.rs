use crate::{camera::Camera, game_object::GameObject, pipeline::Pipeline};

use glam::Mat4;
use vulkanalia::prelude::v1_0::*;
use anyhow::Result;

// Push constants are the fastest way to hand a small amount of
// per-draw data to the shaders; the guaranteed minimum budget
// is 128 bytes, which these two matrices fill exactly. The
// full projection * view * model product is computed on the
// CPU, once per object, rather than per vertex on the GPU.
#[repr(C)]
struct PushConstantData {
    /// Model space all the way to clip space.
    transform: Mat4,
    /// Normals to world space; a 3x3 matrix, padded to 4x4 to
    /// satisfy shader alignment rules.
    normal: Mat4,
}

/// Renders a list of game objects with a single pipeline and a
/// push-constant-only layout.
pub struct SimpleRenderSystem {
    pipeline: Pipeline,
    pipeline_layout: vk::PipelineLayout,
}

impl SimpleRenderSystem {
    pub unsafe fn new(device: &Device, render_pass: vk::RenderPass) -> Result<Self> {
        // The pipeline layout describes the resources the
        // shaders can access; here a single push constant
        // range, visible from both the vertex and the fragment
        // stages, and no descriptor sets.
        let push_constant_range = vk::PushConstantRange::builder()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(std::mem::size_of::<PushConstantData>() as u32);

        let push_constant_ranges = &[push_constant_range];
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .push_constant_ranges(push_constant_ranges);

        let pipeline_layout = device.create_pipeline_layout(&layout_info, None)?;

        let pipeline = Pipeline::new(
            device,
            "shaders/simple.vert.spv",
            "shaders/simple.frag.spv",
            pipeline_layout,
            render_pass,
        )?;

        Ok(Self {
            pipeline,
            pipeline_layout,
        })
    }

    /// Draws every object that has a model, pushing its
    /// matrices and issuing its draw call.
    pub unsafe fn render_game_objects(
        &self,
        device: &Device,
        command_buffer: vk::CommandBuffer,
        game_objects: &[GameObject],
        camera: &Camera,
    ) {
        self.pipeline.bind(device, command_buffer);

        let projection_view = camera.projection() * camera.view();

        for object in game_objects {
            let Some(model) = &object.model else {
                continue;
            };

            let push = PushConstantData {
                transform: projection_view * object.transform.model_matrix(),
                normal: object.transform.normal_matrix(),
            };

            // cmd_push_constants takes raw bytes; the struct is
            // repr(C) with two tightly packed column-major
            // matrices, exactly the layout the shader declares.
            let bytes = std::slice::from_raw_parts(
                &push as *const PushConstantData as *const u8,
                std::mem::size_of::<PushConstantData>(),
            );

            device.cmd_push_constants(
                command_buffer,
                self.pipeline_layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytes,
            );

            model.bind(device, command_buffer);
            model.draw(device, command_buffer);
        }
    }

    pub unsafe fn destroy(&self, device: &Device) {
        self.pipeline.destroy(device);
        device.destroy_pipeline_layout(self.pipeline_layout, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_constants_fit_the_guaranteed_budget() {
        // Vulkan implementations must support at least 128
        // bytes of push constants.
        assert_eq!(std::mem::size_of::<PushConstantData>(), 128);
    }
}
