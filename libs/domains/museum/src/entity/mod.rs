//! Sea-ORM entities read by the event-start scanner.

pub mod event;
pub mod event_participant;

pub use event::EventStatus;
pub use event_participant::ParticipantStatus;
