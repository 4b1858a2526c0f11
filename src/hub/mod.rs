pub mod events;
pub mod gateway;
pub mod registry;

pub use events::{ClientEvent, ServerEvent};
pub use gateway::SessionGateway;
pub use registry::{ConnectionId, RoomDirectory};
