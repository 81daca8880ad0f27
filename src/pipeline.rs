use crate::model::Vertex;

use std::fs;
use std::path::Path;

use vulkanalia::prelude::v1_0::*;
use anyhow::{anyhow, Result};
use log::*;

/// A graphics pipeline paired with the shader pair it was
/// built from. The pipeline layout is owned by the render
/// system that uses it, since the layout describes resources
/// (push constants) that the system, not the pipeline, pushes.
pub struct Pipeline {
    pub handle: vk::Pipeline,
}

impl Pipeline {
    pub unsafe fn new(
        device: &Device,
        vert_path: impl AsRef<Path>,
        frag_path: impl AsRef<Path>,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> Result<Self> {
        // The graphics pipeline is the sequence of operations
        // that take the vertices of the meshes all the way to
        // the pixels on the screen: vertex data is assembled
        // into primitives, transformed by the vertex shader,
        // rasterized into fragments, colored by the fragment
        // shader, and blended into the framebuffer. The
        // programmable stages are the shaders; everything else
        // is fixed-function state configured below.

        // The shader bytecode is compiled offline from GLSL to
        // SPIR-V with the compiler provided by the Vulkan SDK,
        // and loaded here at pipeline creation. Each module is
        // a thin wrapper around the bytecode, consumed by its
        // stage info along with the entry point name (which
        // means different stages could share one file under
        // different entry points).
        let vert = fs::read(vert_path.as_ref()).map_err(|e| {
            anyhow!("Failed to read shader {:?}: {}", vert_path.as_ref(), e)
        })?;
        let frag = fs::read(frag_path.as_ref()).map_err(|e| {
            anyhow!("Failed to read shader {:?}: {}", frag_path.as_ref(), e)
        })?;

        let vert_module = create_shader_module(device, &vert)?;
        let frag_module = create_shader_module(device, &frag)?;

        let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert_module)
            .name(b"main\0");

        let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag_module)
            .name(b"main\0");

        // The vertex input state describes the format of the
        // vertex data passed to the vertex shader: the binding
        // (the spacing between vertices, and whether data is
        // per-vertex or per-instance) and the attributes (the
        // type and offset of each vertex field within a
        // binding).
        let binding_descriptions = Vertex::binding_descriptions();
        let attribute_descriptions = Vertex::attribute_descriptions();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        // The input assembly info struct describes the kind of
        // geometry that will be drawn from the vertices:
        // disjoint triangles from every triplet of vertices,
        // without primitive restart.
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are declared dynamic: their
        // values are recorded into the command buffer at the
        // start of each render pass rather than baked into the
        // pipeline, so a window resize never forces a pipeline
        // rebuild. Only their counts are fixed here.
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = &[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder()
            .dynamic_states(dynamic_states);

        // The rasterizer takes the geometry shaped by the
        // vertex shader and turns it into fragments, filling
        // the polygons. Culling is disabled so that geometry
        // stays visible regardless of its winding.
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        // No multisample antialiasing: a single sample per
        // pixel.
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::_1);

        // The depth test compares each new fragment's depth
        // against the depth buffer with LESS (smaller is
        // closer, in Vulkan's 0..1 range), keeping only the
        // nearest fragment and writing its depth back. No
        // depth bounds test, no stencil.
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        // Color blending is disabled: new fragments overwrite
        // whatever the framebuffer held, with all color
        // channels written.
        let attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::all())
            .blend_enable(false);

        let attachments = &[attachment];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(attachments);

        // Everything above combines into the pipeline info,
        // along with the layout (the push constants referenced
        // by the shaders) and the render pass and subpass
        // index the pipeline will be used in. No parent
        // pipeline to derive from.
        let stages = &[vert_stage, frag_stage];
        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .base_pipeline_handle(vk::Pipeline::null())
            .base_pipeline_index(-1);

        let handle = device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)?
            .0[0];

        // The modules are only needed during creation; the
        // pipeline keeps its own copy of the compiled code.
        device.destroy_shader_module(vert_module, None);
        device.destroy_shader_module(frag_module, None);

        info!("Pipeline created.");
        Ok(Self { handle })
    }

    pub unsafe fn bind(&self, device: &Device, command_buffer: vk::CommandBuffer) {
        device.cmd_bind_pipeline(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            self.handle,
        );
    }

    pub unsafe fn destroy(&self, device: &Device) {
        device.destroy_pipeline(self.handle, None);
    }
}

pub unsafe fn create_shader_module(
    device: &Device,
    bytecode: &[u8],
) -> Result<vk::ShaderModule> {
    // Shader modules are a thin wrapper around the shader
    // bytecode loaded from a GLSL file. The bytecode comes in
    // as an array of u8's, but the Vulkan info struct builder
    // expects u32's, so we need to convert from one to the
    // other. Storing first in a Vec guarantees that the data
    // is properly aligned, and it can then be realigned to
    // u32. The realignment method divides the data into three
    // parts, a suffix, a prefix, and a middle section
    // guaranteed to be properly aligned. If the outside
    // sections are not empty, it means bytecode data was lost
    // because it was not properly aligned in the first place.
    let bytecode = Vec::<u8>::from(bytecode);
    let (prefix, code, suffix) = bytecode.align_to::<u32>();
    if !prefix.is_empty() || !suffix.is_empty() {
        return Err(anyhow!("Shader bytecode is not properly aligned."));
    }

    // The info struct takes in the bytecode slice size, and the
    // bytecode data itself.
    let info = vk::ShaderModuleCreateInfo::builder()
        .code_size(bytecode.len())
        .code(code);

    // Then, the shader module can be created.
    Ok(device.create_shader_module(&info, None)?)
}
