//! Screen implementations. Each screen is a top-level Component.

pub mod devices;
pub mod registry;

use crate::component::Component;
use crate::screen::ScreenId;

pub fn create_screens() -> Vec<(ScreenId, Box<dyn Component>)> {
    vec![
        (ScreenId::Devices, Box::new(devices::DevicesScreen::new())),
        (ScreenId::Registry, Box::new(registry::RegistryScreen::new())),
    ]
}
