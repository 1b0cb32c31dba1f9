//! Fixture module resolving [`EchoService`] during its initialise step.
//!
//! Loaded before the provider on purpose in the lifecycle tests: the
//! service still resolves because the whole batch finishes post-load
//! before any module initialises.

use ngt_context::{ComponentContext, DepRef, InterfaceHandle, Registration};
use ngt_plugin::{ngt_plugin, Plugin};
use parking_lot::Mutex;
use plg_api::{EchoService, WiringProbe};
use std::sync::Arc;

#[derive(Default)]
struct Wiring {
    reply: Mutex<Option<String>>,
    finalised: Mutex<bool>,
}

impl WiringProbe for Wiring {
    fn provider_reply(&self) -> Option<String> {
        self.reply.lock().clone()
    }

    fn finalised(&self) -> bool {
        *self.finalised.lock()
    }
}

#[derive(Default)]
struct ConsumerPlugin {
    wiring: Option<Arc<Wiring>>,
    echo: Option<DepRef<dyn EchoService>>,
    handle: Option<InterfaceHandle>,
}

impl Plugin for ConsumerPlugin {
    fn post_load(&mut self, context: &Arc<ComponentContext>) -> bool {
        let wiring = Arc::new(Wiring::default());
        self.handle = Some(context.register(
            Registration::from_arc(wiring.clone()).implements::<dyn WiringProbe>(|v| v),
        ));
        self.wiring = Some(wiring);
        self.echo = Some(DepRef::new(context));
        true
    }

    fn initialise(&mut self, _context: &Arc<ComponentContext>) {
        let reply = self
            .echo
            .as_ref()
            .and_then(|dep| dep.get())
            .map(|service| service.echo("ping"));
        if let Some(wiring) = &self.wiring {
            *wiring.reply.lock() = reply;
        }
    }

    // Cross-module references are released here, before any module in
    // the batch starts unloading.
    fn finalise(&mut self, _context: &Arc<ComponentContext>) {
        drop(self.echo.take());
        if let Some(wiring) = &self.wiring {
            *wiring.finalised.lock() = true;
        }
    }

    fn unload(&mut self, _context: &Arc<ComponentContext>) {
        drop(self.handle.take());
        drop(self.wiring.take());
    }
}

ngt_plugin!(ConsumerPlugin);
