//! Fixture module whose post-load always fails.
//!
//! It registers a marker first, so the lifecycle tests can check the
//! loader rolled the module's registrations back along with the module.

use ngt_context::{interfaces, ComponentContext};
use ngt_plugin::{ngt_plugin, Plugin};
use plg_api::FaultyMarker;
use std::sync::Arc;

struct Marker;

impl FaultyMarker for Marker {
    fn tag(&self) -> &'static str {
        "faulty"
    }
}

#[derive(Default)]
struct FaultyPlugin;

impl Plugin for FaultyPlugin {
    fn post_load(&mut self, context: &Arc<ComponentContext>) -> bool {
        context
            .register(interfaces!(Marker => dyn FaultyMarker))
            .persist();
        false
    }
}

ngt_plugin!(FaultyPlugin);
