//! Transitions on the banking member's [`BankRecord`].
//!
//! Both balances are clamped at zero after reversals and lifetime
//! adjustments. Withdrawals and redemptions that would overdraw the bank are
//! rejected and leave the record untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{BankRecord, FamilyMember};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankingError {
    #[error("Amount must be positive (got {0})")]
    InvalidAmount(i64),
    #[error("Not enough points in bank: need {requested}, have {available}")]
    InsufficientFunds { requested: i64, available: i64 },
    #[error("Not enough points to deposit: requested {requested}, earned {earned}")]
    DepositExceedsEarned { requested: i64, earned: i64 },
    #[error("Only Vincent can redeem rewards (got {0})")]
    NotBankingMember(FamilyMember),
}

/// A manual bank transaction, as sent by the admin screen.
///
/// Serialized as `{"type": "deposit", "amount": 10}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "amount", rename_all = "snake_case")]
pub enum BankOperation {
    Deposit(i64),
    Withdraw(i64),
    AdjustLifetime(i64),
}

fn require_positive(amount: i64) -> Result<(), BankingError> {
    if amount <= 0 {
        return Err(BankingError::InvalidAmount(amount));
    }
    Ok(())
}

impl BankRecord {
    fn clamp(&mut self) {
        self.bank_points = self.bank_points.max(0);
        self.lifetime_points = self.lifetime_points.max(0);
    }

    /// The banking member finished a task worth `points`.
    pub fn credit_completion(&mut self, points: i64) {
        self.bank_points = self.bank_points.saturating_add(points);
        self.lifetime_points = self.lifetime_points.saturating_add(points);
    }

    /// Undo [`credit_completion`](Self::credit_completion). Clamps instead of
    /// failing when the points were already spent.
    pub fn reverse_completion(&mut self, points: i64) {
        self.bank_points = self.bank_points.saturating_sub(points);
        self.lifetime_points = self.lifetime_points.saturating_sub(points);
        self.clamp();
    }

    /// Move earned points into the bank. `earned` is the member's all-time
    /// completion total.
    pub fn deposit(&mut self, amount: i64, earned: i64) -> Result<(), BankingError> {
        require_positive(amount)?;
        if amount > earned {
            return Err(BankingError::DepositExceedsEarned { requested: amount, earned });
        }
        self.bank_points = self.bank_points.saturating_add(amount);
        Ok(())
    }

    pub fn withdraw(&mut self, amount: i64) -> Result<(), BankingError> {
        require_positive(amount)?;
        if amount > self.bank_points {
            return Err(BankingError::InsufficientFunds {
                requested: amount,
                available: self.bank_points,
            });
        }
        self.bank_points -= amount;
        Ok(())
    }

    pub fn redeem(&mut self, member: FamilyMember, cost: i64) -> Result<(), BankingError> {
        if !member.is_banking_member() {
            return Err(BankingError::NotBankingMember(member));
        }
        require_positive(cost)?;
        if self.bank_points < cost {
            return Err(BankingError::InsufficientFunds {
                requested: cost,
                available: self.bank_points,
            });
        }
        self.bank_points -= cost;
        Ok(())
    }

    /// Admin override of the lifetime counter. Negative deltas are allowed.
    pub fn adjust_lifetime(&mut self, delta: i64) {
        self.lifetime_points = self.lifetime_points.saturating_add(delta);
        self.clamp();
    }

    pub fn apply(&mut self, op: BankOperation, earned: i64) -> Result<(), BankingError> {
        match op {
            BankOperation::Deposit(amount) => self.deposit(amount, earned),
            BankOperation::Withdraw(amount) => self.withdraw(amount),
            BankOperation::AdjustLifetime(delta) => {
                self.adjust_lifetime(delta);
                Ok(())
            }
        }
    }
}
