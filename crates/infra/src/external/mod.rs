//! External service clients/adapters.

pub mod paypal;

pub use paypal::{BillingError, CaptureOutcome, DisabledGateway, PayPalGateway, PaymentGateway};
