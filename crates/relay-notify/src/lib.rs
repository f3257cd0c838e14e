//! Notification fanout for the relay pipeline.
//!
//! After each successful batch commit, [`NotificationFanout`] alerts the
//! current online responders through a [`PushChannel`], in capped
//! sub-batches, flagging invalid tokens for later cleanup.

mod channel;
mod error;
mod fanout;
mod responder;

pub use channel::{PushChannel, PushReport, SendStatus, TokenSend};
pub use error::NotifyError;
pub use fanout::{FanoutReport, NotificationFanout};
pub use responder::{Responder, ResponderDirectory, ResponderStatus};
