//! Robot link: UDP codec, address registry, receive loop and command sender

pub mod messages;
pub mod receiver;
pub mod registry;
pub mod sender;
pub mod telemetry;
pub mod wire;

pub use messages::{
    InboundEnvelope, MessageKind, MoveTarget, OutboundCommand, PropertyValue, SwitchValue,
};
pub use receiver::{DispatchOutcome, Dispatcher, DropReason};
pub use registry::{RegistryEntry, RegistryUpdate, RobotRegistry};
pub use sender::{CommandSender, Diagnostic, SendReport};
pub use telemetry::{EventSink, GuiEvent, RecordingSink};
pub use wire::WireCodec;
