//! Fixture module registering [`EchoService`] for the loader tests.

use ngt_context::{interfaces, ComponentContext, InterfaceHandle};
use ngt_plugin::{ngt_plugin, Plugin};
use plg_api::EchoService;
use std::sync::Arc;

struct Echo;

impl EchoService for Echo {
    fn echo(&self, input: &str) -> String {
        format!("provider:{input}")
    }
}

#[derive(Default)]
struct ProviderPlugin {
    handle: Option<InterfaceHandle>,
}

impl Plugin for ProviderPlugin {
    fn post_load(&mut self, context: &Arc<ComponentContext>) -> bool {
        self.handle = Some(context.register(interfaces!(Echo => dyn EchoService)));
        true
    }

    fn unload(&mut self, _context: &Arc<ComponentContext>) {
        drop(self.handle.take());
    }
}

ngt_plugin!(ProviderPlugin);
