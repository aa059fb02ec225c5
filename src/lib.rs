//! Device server for a single-axis PI E-754 piezo controller.
//!
//! The controller is reached over PI's GCS protocol ([`gcs`]); its axis is
//! wrapped as an [`axis::Axis`] that translates between the controller's
//! dial frame and the user frame, and published to clients as a set of
//! attributes and commands over a JSON-lines TCP protocol
//! ([`socket_server`], [`protocol`]).

pub mod axis;
pub mod config;
pub mod device_manager;
pub mod gcs;
pub mod protocol;
pub mod simulator;
pub mod socket_server;
