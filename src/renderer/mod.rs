pub mod device;
pub mod driver;
pub mod gpu;
pub mod headless;
pub mod quad;

pub use device::{ProgramId, RenderDevice, Surface};
pub use driver::{EffectRenderer, FrameReport};
pub use gpu::{GpuContext, WgpuDevice};
pub use headless::{DeviceCall, HeadlessDevice, HeadlessState};
pub use quad::{FullscreenQuad, Geometry, Vertex};
