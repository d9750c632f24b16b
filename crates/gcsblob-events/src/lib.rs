pub mod cloud_event;
pub mod dispatcher;
pub mod error;
pub mod kinds;
pub mod publisher;
pub mod source;

pub use cloud_event::{CloudEvent, CloudEventFactory, ContentEventData};
pub use dispatcher::{DispatchWorker, EventDispatcher};
pub use error::{EventError, EventResult};
pub use kinds::{ContentEvent, ContentEventKind, ContentSnapshot};
pub use publisher::{LogPublisher, PubSubPublisher, Publisher, publisher_from_settings};
pub use source::ContentEvents;
