pub mod broker;

pub use broker::{Job, JobEnvelope, JobReceiver, QueueError, TaskBroker};
