//! Interfaces of the fixture modules under `plugins/`.
//!
//! The fixture cdylibs and the loader's lifecycle tests both link this
//! crate, so interface ids agree across the boundary and the host can
//! query what the modules registered.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

/// Service registered by `plg-provider`.
pub trait EchoService: Send + Sync {
    /// Echo `input` back, tagged by the provider.
    fn echo(&self, input: &str) -> String;
}

/// Wiring report registered by `plg-consumer`.
///
/// The consumer resolves [`EchoService`] during its initialise step and
/// records the result here, which is how the tests observe that the
/// whole batch finished post-load before any module initialised.
pub trait WiringProbe: Send + Sync {
    /// What the provider answered during initialise, `None` if the
    /// service never resolved.
    fn provider_reply(&self) -> Option<String>;

    /// Whether the consumer's finalise step ran.
    fn finalised(&self) -> bool;
}

/// Marker registered by `plg-faulty` before it fails its own load.
///
/// Must never be visible after a load pass; the loader tears the failed
/// module's context down again.
pub trait FaultyMarker: Send + Sync {
    /// Identifies the registrant in diagnostics.
    fn tag(&self) -> &'static str;
}
