// ── Portal settings modules ──
//
// One module per settings area. `standard` builds the full set in the
// order the portal registers them; registration order is also the order
// startup requests go out and broadcasts are delivered.

mod common;
pub mod apoint;
pub mod control;
pub mod device;
pub mod ledstrip;
pub mod mqtt;
pub mod network;
pub mod update;
pub mod wifi;

use crate::context::Context;
use crate::module::Module;

pub use apoint::AccessPointModule;
pub use control::ControlModule;
pub use device::DeviceModule;
pub use ledstrip::LedStripModule;
pub use mqtt::MqttModule;
pub use network::NetworkModule;
pub use update::UpdateModule;
pub use wifi::WifiModule;

/// Every module the portal ships, in registration order.
pub fn standard(ctx: &Context) -> Vec<Box<dyn Module>> {
    vec![
        Box::new(ControlModule::new(ctx.clone())),
        Box::new(DeviceModule::new(ctx.clone())),
        Box::new(LedStripModule::new(ctx.clone())),
        Box::new(NetworkModule::new(ctx.clone())),
        Box::new(AccessPointModule::new(ctx.clone())),
        Box::new(WifiModule::new(ctx.clone())),
        Box::new(MqttModule::new(ctx.clone())),
        Box::new(UpdateModule::new(ctx.clone())),
    ]
}
