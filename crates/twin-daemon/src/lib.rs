//! twin-daemon library target.
//!
//! Exposes the router, shared state and the loopback ports so the scenario
//! tests can wire a daemon without binding a socket.

pub mod actuator;
pub mod api_types;
pub mod hub;
pub mod routes;
pub mod state;
