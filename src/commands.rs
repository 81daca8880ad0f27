use crate::{queues::QueueFamilyIndices, renderer::RenderData};

use vulkanalia::prelude::v1_0::*;
use anyhow::Result;
use log::info;

pub unsafe fn create_command_pool(
    instance: &Instance,
    device: &Device,
    data: &mut RenderData,
) -> Result<()> {
    // Commands in Vulkan, like drawing operations and memory
    // transfers, are not executed directly, but recorded in a
    // command buffer and then executed. Command buffers
    // themselves are not allocated directly but within an
    // opaque object called a "command pool", which manages the
    // memory that is used to store the buffers and locks it to
    // a singular thread. A single pool is shared by all frame
    // command buffers; the pool flags are:
    //  - TRANSIENT: command buffers allocated here are
    //    re-recorded with new commands very often;
    //  - RESET_COMMAND_BUFFER: command buffers can be
    //    re-recorded individually rather than resetting the
    //    whole pool at once.
    let indices = QueueFamilyIndices::get(instance, data, data.physical_device)?;
    let info = vk::CommandPoolCreateInfo::builder()
        .flags(vk::CommandPoolCreateFlags::TRANSIENT
            | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
        .queue_family_index(indices.graphics);

    data.command_pool = device.create_command_pool(&info, None)?;

    info!("Command pool created.");
    Ok(())
}

pub unsafe fn allocate_command_buffers(
    device: &Device,
    data: &RenderData,
    count: u32,
) -> Result<Vec<vk::CommandBuffer>> {
    // All GPU commands go through command buffers, which are
    // submitted to a queue to be executed. One primary buffer
    // is allocated per swapchain image: once a buffer is
    // submitted it goes into the pending state and cannot be
    // re-recorded, so a single buffer would force every frame
    // to wait for the previous one to fully finish. Primary
    // buffers (as opposed to secondary ones) can be submitted
    // to a queue directly.
    let allocate_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(data.command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count);

    let command_buffers = device.allocate_command_buffers(&allocate_info)?;

    info!("Allocated {} frame command buffers.", count);
    Ok(command_buffers)
}

pub unsafe fn free_command_buffers(
    device: &Device,
    data: &RenderData,
    command_buffers: &[vk::CommandBuffer],
) {
    // Returning buffers to the pool (rather than destroying
    // the pool) is only needed when the swapchain image count
    // changed on recreation and a differently-sized set has to
    // be allocated.
    device.free_command_buffers(data.command_pool, command_buffers);
}

pub unsafe fn begin_single_command(
    device: &Device,
    data: &RenderData,
) -> Result<vk::CommandBuffer> {
    // Short-lived commands, like buffer copies during model
    // upload, get a throwaway primary buffer from the shared
    // pool, recorded with the ONE_TIME_SUBMIT flag since it is
    // submitted once and freed right after.
    let allocate_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(data.command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let command_buffer = device.allocate_command_buffers(&allocate_info)?[0];

    let info = vk::CommandBufferBeginInfo::builder()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

    device.begin_command_buffer(command_buffer, &info)?;

    Ok(command_buffer)
}

pub unsafe fn end_single_command(
    device: &Device,
    data: &RenderData,
    command_buffer: vk::CommandBuffer,
) -> Result<()> {
    device.end_command_buffer(command_buffer)?;

    // Submit on the graphics queue and wait for it to drain;
    // transfer-time commands are rare enough (model upload at
    // startup) that a fence would be overkill.
    let command_buffers = &[command_buffer];
    let info = vk::SubmitInfo::builder()
        .command_buffers(command_buffers);

    device.queue_submit(data.graphics_queue, &[info], vk::Fence::null())?;
    device.queue_wait_idle(data.graphics_queue)?;

    device.free_command_buffers(data.command_pool, command_buffers);

    Ok(())
}
