//! Print the balance and recent transactions of every open account.
//!
//! ```text
//! MONZO_ACCESS_TOKEN=... cargo run --example list_transactions -- 3
//! ```
//!
//! The optional argument limits how many pages of 100 are fetched.

use monzo_rs::models::TransactionsQuery;
use monzo_rs::{MonzoClient, Result};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let max_pages = std::env::args().nth(1).and_then(|arg| arg.parse().ok());
    let client = MonzoClient::from_env()?;

    let me = client.whoami()?;
    println!("User {}", me.user_id);

    for account in client.accounts().list()? {
        let balance = client.balances().get(&account.id)?;
        println!(
            "\n{} [{}] balance {} {}",
            account.id, account.account_type, balance.balance, balance.currency
        );

        let transactions = client
            .transactions()
            .list_all(&account.id, TransactionsQuery::new(), max_pages)?;
        for tx in transactions.iter().rev().take(20) {
            let state = if tx.settled.is_some() { " " } else { "*" };
            println!(
                "{state} {} {:>9} {:<16} {}",
                tx.created.format("%Y-%m-%d"),
                tx.amount,
                tx.category,
                tx.description
            );
        }
        println!("{} transactions", transactions.len());
    }

    Ok(())
}
