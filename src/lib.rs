//! Signal relay: a single current trading signal flows from an HTTP store,
//! through a polling agent and a cross-context message bus, into a host
//! application's configuration surface.

pub mod agent;
pub mod bus;
pub mod config;
pub mod control;
pub mod core;
pub mod injector;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod signals;
pub mod storage;
pub mod store;
