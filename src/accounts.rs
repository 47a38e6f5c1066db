//! A user's own profile and banana balance.

use log::{info, Logger};
use serde::Serialize;

use crate::db::SafeDb;
use crate::entities::User;
use crate::errors::BackendError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Profile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Profile {
            name: user.name,
            email: user.email,
            image: user.image,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Balance {
    pub balance: i32,
}

impl From<&User> for Balance {
    fn from(user: &User) -> Self {
        Balance {
            balance: user.bananas,
        }
    }
}

/// Adds a positive number of bananas to the user's balance.
pub async fn add_bananas(
    logger: &Logger,
    db: &SafeDb,
    user: &User,
    amount: i32,
) -> Result<Balance, BackendError> {
    if amount <= 0 {
        return Err(BackendError::InvalidAmount(amount));
    }

    let balance = db.add_bananas(user.id, amount).await?;
    info!(logger, "Added bananas"; "user_id" => user.id, "amount" => amount, "balance" => balance);

    Ok(Balance { balance })
}
