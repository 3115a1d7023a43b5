//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `email` - Transactional email (verification codes, welcome)
//! - `otp` - Newsletter email verification flow

pub mod email;
pub mod otp;

pub use email::{LogMailer, MailError, Mailer, OutboxMailer, OutboxMessage, SmtpMailer};
pub use otp::{Clock, ManualClock, OtpError, OtpService, SystemClock};
