/// A device on wgpu's noop backend: resources can be created and commands
/// recorded, but nothing is executed. Readbacks are not meaningful on it.
pub async fn noop_wgpu() -> (wgpu::Instance, wgpu::Adapter, wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::NOOP,
        backend_options: wgpu::BackendOptions {
            noop: wgpu::NoopBackendOptions { enable: true },
            ..Default::default()
        },
        ..Default::default()
    });

    let adapter = instance
        .enumerate_adapters(wgpu::Backends::NOOP)
        .pop()
        .expect("Failed to find noop adapter");

    let (device, queue) = adapter
        .request_device(&Default::default())
        .await
        .expect("Failed to create device");

    (instance, adapter, device, queue)
}

/// A device that really executes work, software adapters included.
///
/// `None` when the machine has no usable adapter; GPU round-trip tests skip then.
pub async fn executing_wgpu() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok()?;

    adapter
        .request_device(&wgpu::DeviceDescriptor::default())
        .await
        .ok()
}
