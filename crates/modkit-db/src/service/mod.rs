//! # Services
//!
//! Request-level operations composed from the repositories and the pure
//! rules in `modkit-core`. Handlers construct a service with the storage
//! it needs and call it; services hold no state of their own.
//!
//! - [`cart`] - Batched cart validation
//! - [`pricing`] - Display price and deposit amount for a customer
//! - [`checkout`] - Payment-completed webhook to order
//! - [`refund`] - Deposit refunds through the payment processor

pub mod cart;
pub mod checkout;
pub mod pricing;
pub mod refund;

pub use cart::CartValidator;
pub use checkout::{handle_checkout_completed, CheckoutCompleted, CheckoutLineItem, WebhookOutcome};
pub use pricing::PricingService;
pub use refund::{refund_active_deposit, refund_deposit_order, RefundGateway, RefundReceipt};
