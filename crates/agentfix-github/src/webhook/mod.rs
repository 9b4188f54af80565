//! Inbound webhook authentication and payload classification.

mod events;
mod validation;

pub use events::{
    ChangesRequestedReview, WebhookEvent, CHANGES_REQUESTED, DELIVERY_HEADER, EVENT_HEADER,
    SIGNATURE_HEADER,
};
pub use validation::{sign_payload, verify_signature, SignatureValidator};
