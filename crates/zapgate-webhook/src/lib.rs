//! Webhook delivery: a durable queue of notification events, delivered with
//! exponential backoff and swept periodically for retries.
//!
//! Delivery failure is data, not an error — every attempt's outcome lands on
//! the [`WebhookEvent`](zapgate_core::webhook::WebhookEvent) row itself, and
//! the dispatcher never propagates a failed POST to its caller.

pub mod dispatcher;

pub use dispatcher::WebhookDispatcher;
