//! Client side of the aquarium heater controller: the [`RemoteClient`] contract,
//! its HTTP implementation and a scripted mock for tests.

pub mod http;
pub mod remote;

pub use http::HttpRemoteClient;
pub use remote::{Ack, MockRemoteClient, RawReading, RemoteClient, RemoteError, TemperatureBounds};
