use crate::{
    buffers::{copy_buffer, create_buffer},
    renderer::RenderData,
};

use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    io::BufReader,
    path::Path,
    ptr::copy_nonoverlapping as memcpy,
};

use glam::{vec3, Vec2, Vec3};
use vulkanalia::prelude::v1_0::*;
use anyhow::{anyhow, Result};
use log::info;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn binding_descriptions() -> [vk::VertexInputBindingDescription; 1] {
        // After uploading the vertex data to the GPU, we need
        // to tell Vulkan how to pass it to the shader. The
        // first struct needed to convey this information is
        // the vertex binding info, used to describe the rate
        // at which to load data from memory throughout the
        // vertices, precising:
        //  - the binding index, an index into the array of
        //    buffers bound with vkCmdBindVertexBuffers;
        //  - the stride, the number of bytes between
        //    consecutive elements in the buffer;
        //  - the input rate, specifying whether to move to the
        //    next data entry after each vertex or after each
        //    instance.
        [vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(std::mem::size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()]
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        // The second struct(s) is the vertex attribute
        // description. Each attribute description struct
        // describes how to extract a vertex attribute from a
        // chunk of vertex data originating from a binding
        // description. It contains:
        //  - the binding index, which is the binding number
        //    this attribute takes its data from;
        //  - the location index, the shader input location
        //    number for this attribute (the x in
        //    'layout(location = x)');
        //  - the format of the attribute data, precising its
        //    size and type (a 3D position is a vec3 of signed
        //    floats, so a R32G32B32_SFLOAT format);
        //  - the byte offset of the attribute relative to the
        //    beginning of the vertex data, each one the
        //    running total of the sizes before it.
        let position = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(0)
            .build();

        let color = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(1)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(std::mem::size_of::<Vec3>() as u32)
            .build();

        let normal = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(2)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset((2 * std::mem::size_of::<Vec3>()) as u32)
            .build();

        let uv = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(3)
            .format(vk::Format::R32G32_SFLOAT)
            .offset((3 * std::mem::size_of::<Vec3>()) as u32)
            .build();

        [position, color, normal, uv]
    }
}

// Vertices are deduplicated through a hashmap when loading
// models, which needs equality and hashing on float fields;
// comparing the bit patterns gives us both (NaNs never appear
// in mesh data).

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        let bits = |v: &Vertex| {
            let mut bits = Vec::with_capacity(11);
            bits.extend(v.position.to_array().map(f32::to_bits));
            bits.extend(v.color.to_array().map(f32::to_bits));
            bits.extend(v.normal.to_array().map(f32::to_bits));
            bits.extend(v.uv.to_array().map(f32::to_bits));
            bits
        };

        bits(self) == bits(other)
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.position.to_array().map(f32::to_bits).hash(state);
        self.color.to_array().map(f32::to_bits).hash(state);
        self.normal.to_array().map(f32::to_bits).hash(state);
        self.uv.to_array().map(f32::to_bits).hash(state);
    }
}

/// A mesh uploaded to device local memory: a vertex buffer,
/// and optionally an index buffer when the mesh benefits from
/// vertex reuse.
pub struct Model {
    vertex_buffer: vk::Buffer,
    vertex_buffer_memory: vk::DeviceMemory,
    vertex_count: u32,
    index_buffer: Option<(vk::Buffer, vk::DeviceMemory)>,
    index_count: u32,
}

impl Model {
    /// Uploads the given mesh data to the device. An empty
    /// index slice means the model is drawn directly from the
    /// vertex buffer; an empty vertex slice is an error, since
    /// there would be nothing to draw.
    pub unsafe fn new(
        instance: &Instance,
        device: &Device,
        data: &RenderData,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<Self> {
        if vertices.is_empty() {
            return Err(anyhow!("Cannot build a model from an empty mesh."));
        }

        let (vertex_buffer, vertex_buffer_memory) = upload_buffer(
            instance,
            device,
            data,
            vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let index_buffer = if indices.is_empty() {
            None
        } else {
            Some(upload_buffer(
                instance,
                device,
                data,
                indices,
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?)
        };

        Ok(Self {
            vertex_buffer,
            vertex_buffer_memory,
            vertex_count: vertices.len() as u32,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Loads an OBJ file and uploads it as a single indexed
    /// mesh.
    pub unsafe fn from_file(
        instance: &Instance,
        device: &Device,
        data: &RenderData,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);

        // The tobj crate loads both models and materials, but
        // we are only interested in model data. The default
        // options for GPU loading give us triangulated faces
        // (because that's what we work with in our shader),
        // single-indexed vertices, and discard degenerate
        // faces (points or lines not forming a triangle).
        let (models, _) = tobj::load_obj_buf(
            &mut reader,
            &tobj::GPU_LOAD_OPTIONS,
            |_| Ok(Default::default()),
        )?;

        let (vertices, indices) = build_mesh(&models);
        info!(
            "Loaded model {:?} ({} unique vertices, {} indices).",
            path.as_ref(),
            vertices.len(),
            indices.len()
        );

        Self::new(instance, device, data, &vertices, &indices)
    }

    pub unsafe fn bind(&self, device: &Device, command_buffer: vk::CommandBuffer) {
        device.cmd_bind_vertex_buffers(command_buffer, 0, &[self.vertex_buffer], &[0]);

        if let Some((index_buffer, _)) = self.index_buffer {
            device.cmd_bind_index_buffer(command_buffer, index_buffer, 0, vk::IndexType::UINT32);
        }
    }

    pub unsafe fn draw(&self, device: &Device, command_buffer: vk::CommandBuffer) {
        if self.index_buffer.is_some() {
            device.cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
        } else {
            device.cmd_draw(command_buffer, self.vertex_count, 1, 0, 0);
        }
    }

    pub unsafe fn destroy(&self, device: &Device) {
        if let Some((index_buffer, index_buffer_memory)) = self.index_buffer {
            device.destroy_buffer(index_buffer, None);
            device.free_memory(index_buffer_memory, None);
        }

        device.destroy_buffer(self.vertex_buffer, None);
        device.free_memory(self.vertex_buffer_memory, None);
    }
}

/// Flattens the loaded OBJ models into a single deduplicated
/// vertex list and the index list referencing it.
pub fn build_mesh(models: &[tobj::Model]) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    // There are a lot of vertices, but most are "repeated", in
    // the sense that they correspond to the same position in
    // space. Since the index buffer already stores the
    // correspondence between triangle corners and vertices, we
    // do not need to store every corner of the OBJ in the
    // vertex buffer, but only each unique one. This is done
    // with a hashmap.
    let mut unique = HashMap::new();

    for model in models {
        let mesh = &model.mesh;
        for &index in &mesh.indices {
            let index = index as usize;

            let position = vec3(
                mesh.positions[3 * index],
                mesh.positions[3 * index + 1],
                mesh.positions[3 * index + 2],
            );

            // Per-vertex colors are an OBJ extension; models
            // without them get white, which the lighting in
            // the fragment shader modulates.
            let color = if mesh.vertex_color.is_empty() {
                vec3(1.0, 1.0, 1.0)
            } else {
                vec3(
                    mesh.vertex_color[3 * index],
                    mesh.vertex_color[3 * index + 1],
                    mesh.vertex_color[3 * index + 2],
                )
            };

            let normal = if mesh.normals.is_empty() {
                Vec3::ZERO
            } else {
                vec3(
                    mesh.normals[3 * index],
                    mesh.normals[3 * index + 1],
                    mesh.normals[3 * index + 2],
                )
            };

            let uv = if mesh.texcoords.is_empty() {
                Vec2::ZERO
            } else {
                Vec2::new(
                    mesh.texcoords[2 * index],
                    mesh.texcoords[2 * index + 1],
                )
            };

            let vertex = Vertex {
                position,
                color,
                normal,
                uv,
            };

            // If the vertex has already been visited, we just
            // push its index to the list; otherwise, we add
            // the vertex/index pair to the map and to their
            // corresponding buffers.
            if let Some(&index) = unique.get(&vertex) {
                indices.push(index as u32);
            } else {
                let index = vertices.len();
                unique.insert(vertex, index);

                vertices.push(vertex);
                indices.push(index as u32);
            }
        }
    }

    (vertices, indices)
}

unsafe fn upload_buffer<T: Copy>(
    instance: &Instance,
    device: &Device,
    data: &RenderData,
    items: &[T],
    usage: vk::BufferUsageFlags,
) -> Result<(vk::Buffer, vk::DeviceMemory)> {
    // Buffer memory can have different properties, that make
    // it visible to the host, to the device, or both. Ideally,
    // mesh buffers should be allocated on GPU memory optimized
    // for reading access. In order to transfer the data from
    // the CPU to the GPU, we first create a temporary buffer
    // in host-visible memory, the "staging buffer". This
    // buffer is both HOST_VISIBLE (stored in CPU-accessible
    // memory) and HOST_COHERENT (memory writes are visible
    // both from the CPU and the GPU without explicit cache
    // flushes). It is also marked as a TRANSFER_SRC buffer,
    // meaning that it can be used as the source of a transfer
    // command.
    let size = (std::mem::size_of::<T>() * items.len()) as u64;
    let (staging_buffer, staging_buffer_memory) = create_buffer(
        instance,
        device,
        data,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;

    // We then map the staging buffer memory into CPU
    // accessible memory (that is, obtain a CPU pointer into
    // device memory), copy the data into it, and unmap it.
    let memory = device.map_memory(
        staging_buffer_memory,
        0,
        size,
        vk::MemoryMapFlags::empty(),
    )?;

    memcpy(items.as_ptr(), memory.cast(), items.len());
    device.unmap_memory(staging_buffer_memory);

    // The actual buffer has the same size, TRANSFER_DST
    // (destination of a transfer operation) combined with its
    // mesh usage flag, and is allocated on DEVICE_LOCAL
    // (optimal, but not guaranteed to be CPU-accessible)
    // memory.
    let (buffer, buffer_memory) = create_buffer(
        instance,
        device,
        data,
        size,
        vk::BufferUsageFlags::TRANSFER_DST | usage,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    // We can then finally copy the data from the staging
    // buffer to the device buffer, destroy the staging buffer
    // and free its memory.
    copy_buffer(device, data, staging_buffer, buffer, size)?;
    device.destroy_buffer(staging_buffer, None);
    device.free_memory(staging_buffer_memory, None);

    Ok((buffer, buffer_memory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;

    fn vertex(position: Vec3) -> Vertex {
        Vertex {
            position,
            color: vec3(1.0, 1.0, 1.0),
            normal: vec3(0.0, 0.0, 1.0),
            uv: vec2(0.0, 0.0),
        }
    }

    #[test]
    fn attribute_offsets_cover_the_vertex() {
        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[2].offset, 24);
        assert_eq!(attributes[3].offset, 36);

        let [binding] = Vertex::binding_descriptions();
        assert_eq!(binding.stride as usize, std::mem::size_of::<Vertex>());
    }

    #[test]
    fn equal_vertices_compare_and_hash_equal() {
        use std::collections::hash_map::DefaultHasher;

        let a = vertex(vec3(1.0, 2.0, 3.0));
        let b = vertex(vec3(1.0, 2.0, 3.0));
        assert_eq!(a, b);

        let hash = |v: &Vertex| {
            let mut hasher = DefaultHasher::new();
            v.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash(&a), hash(&b));

        let c = vertex(vec3(1.0, 2.0, 4.0));
        assert_ne!(a, c);
    }

    #[test]
    fn mesh_building_deduplicates_shared_corners() {
        // A quad as two triangles sharing an edge: six corners,
        // four unique vertices.
        let mesh = tobj::Mesh {
            positions: vec![
                0.0, 0.0, 0.0,
                1.0, 0.0, 0.0,
                1.0, 1.0, 0.0,
                0.0, 0.0, 0.0,
                1.0, 1.0, 0.0,
                0.0, 1.0, 0.0,
            ],
            indices: vec![0, 1, 2, 3, 4, 5],
            ..Default::default()
        };

        let models = vec![tobj::Model::new(mesh, "quad".into())];
        let (vertices, indices) = build_mesh(&models);

        assert_eq!(vertices.len(), 4);
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn missing_attributes_get_defaults() {
        let mesh = tobj::Mesh {
            positions: vec![0.0, 0.0, 0.0],
            indices: vec![0],
            ..Default::default()
        };

        let models = vec![tobj::Model::new(mesh, "point".into())];
        let (vertices, _) = build_mesh(&models);

        assert_eq!(vertices[0].color, vec3(1.0, 1.0, 1.0));
        assert_eq!(vertices[0].normal, Vec3::ZERO);
        assert_eq!(vertices[0].uv, Vec2::ZERO);
    }
}
