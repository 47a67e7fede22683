//! API service modules for Monzo endpoints.
//!
//! Each service covers one group of endpoints and is obtained from
//! [`MonzoClient`](crate::MonzoClient).

mod accounts;
mod attachments;
mod balances;
mod feed;
mod pots;
mod transactions;
mod webhooks;

pub use accounts::AccountsService;
pub use attachments::AttachmentsService;
pub use balances::BalancesService;
pub use feed::FeedService;
pub use pots::PotsService;
pub use transactions::TransactionsService;
pub use webhooks::WebhooksService;
