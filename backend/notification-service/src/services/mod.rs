pub mod channels;
pub mod dispatcher;
pub mod jobs;
pub mod quiet_hours;
pub mod scheduler;
pub mod triggers;

pub use channels::{
    ChannelSender, DeliveryOutcome, EmailSender, HttpPushTransport, InAppSender, MailTransport,
    PushSender, PushTransport, RecipientOutcome, SmtpMailer, TemplateRegistry,
};
pub use dispatcher::Dispatcher;
pub use jobs::{jobs, CadenceJob, CadenceJobKind};
pub use scheduler::{Scheduler, MAX_SWEEP_ATTEMPTS};
pub use triggers::{milestone_crossed, TriggerService};
