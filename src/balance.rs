use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{BalanceError, StorageError};
use crate::repository::BalanceStore;
use crate::types::{
    AccountBalances, AccountType, BalanceData, BalancePatch, HistoryPoint, NewTx, Tx, TxAction,
    SNAPSHOT_VERSION,
};

/// Points in a synthetic balance history
pub const HISTORY_POINTS: usize = 50;
/// Spacing between history points (30 minutes, ~25h in total)
pub const HISTORY_STEP_MS: i64 = 30 * 60 * 1000;
/// Transactions kept per account
pub const MAX_TXS: usize = 10;

const TX_ID_LEN: usize = 16;
const TX_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TX_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Generate a wavy stand-in history ending exactly at `balance` at `now_ms`.
///
/// Deviation is a sine/cosine mix plus uniform noise, damped towards the
/// most recent point so the chart lands on the real balance.
pub fn synthetic_history<R: Rng + ?Sized>(
    balance: Decimal,
    now_ms: i64,
    rng: &mut R,
) -> Vec<HistoryPoint> {
    let balance = balance.to_f64().unwrap_or(0.0);
    let last = (HISTORY_POINTS - 1) as f64;

    (0..HISTORY_POINTS)
        .map(|i| {
            let steps_back = (HISTORY_POINTS - 1 - i) as i64;
            let time = now_ms - steps_back * HISTORY_STEP_MS;

            let phase = i as f64;
            let wave = 0.03 * (phase / 4.0).sin() + 0.015 * (phase / 7.0).cos();
            let noise: f64 = rng.gen_range(-0.01..0.01);
            let damping = steps_back as f64 / last;
            let value = balance * (1.0 + (wave + noise) * damping);

            HistoryPoint {
                time,
                value: (value * 100.0).round() / 100.0,
            }
        })
        .collect()
}

/// Derive the overview ledger from its two constituents.
///
/// Pure: the same inputs and `now_ms` always give the same ledger.
pub fn derive_overview(trading: &BalanceData, funding: &BalanceData, now_ms: i64) -> BalanceData {
    let total = trading.total_balance_usdt.saturating_add(funding.total_balance_usdt);

    let mut txs: Vec<Tx> = trading.txs.iter().chain(funding.txs.iter()).cloned().collect();
    // Stable sort, so same-second entries keep trading before funding
    txs.sort_by(|a, b| b.date.cmp(&a.date));
    txs.truncate(MAX_TXS);

    let mut rng = StdRng::seed_from_u64(now_ms as u64);

    BalanceData {
        total_balance_usdt: total,
        balance_history: synthetic_history(total, now_ms, &mut rng),
        profit: trading.profit.saturating_add(funding.profit),
        loss: trading.loss.saturating_add(funding.loss),
        txs,
    }
}

fn generate_tx_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..TX_ID_LEN)
        .map(|_| TX_ID_CHARSET[rng.gen_range(0..TX_ID_CHARSET.len())] as char)
        .collect()
}

fn make_tx<R: Rng + ?Sized>(new_tx: NewTx, rng: &mut R) -> Tx {
    Tx {
        date: Utc::now().format(TX_DATE_FORMAT).to_string(),
        action: new_tx.action,
        amount: format!("{:.2}", new_tx.amount),
        symbol: new_tx.symbol,
        tx_id: generate_tx_id(rng),
    }
}

fn push_tx(data: &mut BalanceData, tx: Tx) {
    data.txs.insert(0, tx);
    data.txs.truncate(MAX_TXS);
}

fn ensure_positive(amount: Decimal) -> Result<(), BalanceError> {
    if amount <= Decimal::ZERO {
        return Err(BalanceError::InvalidAmount(amount));
    }
    Ok(())
}

/// `balance + delta`, or `AmountOutOfRange` when it leaves Decimal's range
fn checked_shift(balance: Decimal, delta: Decimal, account: AccountType) -> Result<Decimal, BalanceError> {
    balance
        .checked_add(delta)
        .ok_or(BalanceError::AmountOutOfRange(delta.abs(), account))
}

/// The two stored ledgers; overview is never held, only derived
#[derive(Debug, Clone)]
struct Ledgers {
    trading: BalanceData,
    funding: BalanceData,
}

impl Ledgers {
    fn account(&self, account: AccountType) -> &BalanceData {
        match account {
            AccountType::Trading => &self.trading,
            AccountType::Funding => &self.funding,
        }
    }

    fn account_mut(&mut self, account: AccountType) -> &mut BalanceData {
        match account {
            AccountType::Trading => &mut self.trading,
            AccountType::Funding => &mut self.funding,
        }
    }

    /// The derived overview must fit in a Decimal too
    fn ensure_summable(&self) -> Result<(), BalanceError> {
        let (t, f) = (&self.trading, &self.funding);
        for (a, b) in [
            (t.total_balance_usdt, f.total_balance_usdt),
            (t.profit, f.profit),
            (t.loss, f.loss),
        ] {
            if a.checked_add(b).is_none() {
                return Err(BalanceError::AmountOutOfRange(b, AccountType::Funding));
            }
        }
        Ok(())
    }

    fn snapshot(&self, now_ms: i64) -> AccountBalances {
        AccountBalances {
            version: SNAPSHOT_VERSION,
            overview: derive_overview(&self.trading, &self.funding, now_ms),
            trading: self.trading.clone(),
            funding: self.funding.clone(),
        }
    }
}

/// Trading/funding ledgers with a derived overview, persisted on every change
pub struct BalanceManager {
    store: Arc<dyn BalanceStore>,
    ledgers: Mutex<Ledgers>,
    rng: std::sync::Mutex<StdRng>,
}

impl BalanceManager {
    /// Load balances from `store`, seeding it with the initial balances when empty.
    ///
    /// A stored overview that disagrees with its constituents is repaired,
    /// and legacy documents are rewritten at the current schema version.
    pub async fn load(
        store: Arc<dyn BalanceStore>,
        initial_trading: Decimal,
        initial_funding: Decimal,
    ) -> Result<Self, StorageError> {
        Self::load_with_rng(store, initial_trading, initial_funding, StdRng::from_entropy()).await
    }

    pub async fn load_with_rng(
        store: Arc<dyn BalanceStore>,
        initial_trading: Decimal,
        initial_funding: Decimal,
        mut rng: StdRng,
    ) -> Result<Self, StorageError> {
        let now = Utc::now().timestamp_millis();

        let (ledgers, needs_save) = match store.load_account_balances().await? {
            Some(snapshot) => {
                let derived = snapshot
                    .trading
                    .total_balance_usdt
                    .saturating_add(snapshot.funding.total_balance_usdt);
                let drifted = snapshot.overview.total_balance_usdt != derived;
                if drifted {
                    tracing::warn!(
                        stored = %snapshot.overview.total_balance_usdt,
                        derived = %derived,
                        "overview balance out of sync with trading + funding, repairing"
                    );
                }
                let outdated = snapshot.version < SNAPSHOT_VERSION;
                if outdated {
                    tracing::info!(from = snapshot.version, to = SNAPSHOT_VERSION, "upgrading balances schema");
                }
                (
                    Ledgers {
                        trading: snapshot.trading,
                        funding: snapshot.funding,
                    },
                    drifted || outdated,
                )
            }
            None => {
                tracing::info!(
                    trading = %initial_trading,
                    funding = %initial_funding,
                    "no stored balances, seeding initial ledgers"
                );
                let mut seed = |total: Decimal| BalanceData {
                    total_balance_usdt: total,
                    balance_history: synthetic_history(total, now, &mut rng),
                    ..BalanceData::empty()
                };
                (
                    Ledgers {
                        trading: seed(initial_trading),
                        funding: seed(initial_funding),
                    },
                    true,
                )
            }
        };

        if needs_save {
            store.save_account_balances(&ledgers.snapshot(now)).await?;
        }

        Ok(Self {
            store,
            ledgers: Mutex::new(ledgers),
            rng: std::sync::Mutex::new(rng),
        })
    }

    pub async fn trading(&self) -> BalanceData {
        self.ledgers.lock().await.trading.clone()
    }

    pub async fn funding(&self) -> BalanceData {
        self.ledgers.lock().await.funding.clone()
    }

    /// Overview derived from the current trading and funding ledgers
    pub async fn overview(&self) -> BalanceData {
        let ledgers = self.ledgers.lock().await;
        derive_overview(&ledgers.trading, &ledgers.funding, Utc::now().timestamp_millis())
    }

    pub async fn snapshot(&self) -> AccountBalances {
        self.ledgers
            .lock()
            .await
            .snapshot(Utc::now().timestamp_millis())
    }

    pub async fn balance_of(&self, account: AccountType) -> Decimal {
        self.ledgers.lock().await.account(account).total_balance_usdt
    }

    pub async fn update_trading_balance(&self, patch: BalancePatch) -> Result<BalanceData, BalanceError> {
        self.update_balance(AccountType::Trading, patch).await
    }

    pub async fn update_funding_balance(&self, patch: BalancePatch) -> Result<BalanceData, BalanceError> {
        self.update_balance(AccountType::Funding, patch).await
    }

    /// Shallow-merge `patch` into `account`. No range checks: negative
    /// balances are stored as given.
    pub async fn update_balance(
        &self,
        account: AccountType,
        patch: BalancePatch,
    ) -> Result<BalanceData, BalanceError> {
        self.commit(|ledgers, rng| {
            let data = ledgers.account_mut(account);
            let balance_changed = patch
                .total_balance_usdt
                .is_some_and(|total| total != data.total_balance_usdt);

            if let Some(total) = patch.total_balance_usdt {
                data.total_balance_usdt = total;
            }
            match patch.balance_history {
                Some(history) => data.balance_history = history,
                None if balance_changed => {
                    data.balance_history = synthetic_history(
                        data.total_balance_usdt,
                        Utc::now().timestamp_millis(),
                        rng,
                    )
                }
                None => {}
            }
            if let Some(profit) = patch.profit {
                data.profit = profit;
            }
            if let Some(loss) = patch.loss {
                data.loss = loss;
            }
            if let Some(txs) = patch.txs {
                data.txs = txs;
            }
            Ok(data.clone())
        })
        .await
    }

    /// Prepend a transaction to `account`, keeping the newest [`MAX_TXS`]
    pub async fn add_transaction(&self, account: AccountType, new_tx: NewTx) -> Result<Tx, BalanceError> {
        self.commit(|ledgers, rng| {
            let tx = make_tx(new_tx, rng);
            push_tx(ledgers.account_mut(account), tx.clone());
            Ok(tx)
        })
        .await
    }

    /// Move `amount` USDT between the two ledgers. Same-account transfers are
    /// a no-op; nothing changes when the source cannot cover the amount.
    pub async fn transfer_between_accounts(
        &self,
        from: AccountType,
        to: AccountType,
        amount: Decimal,
    ) -> Result<(), BalanceError> {
        if from == to {
            tracing::debug!(account = %from, "ignoring transfer to the same account");
            return Ok(());
        }
        ensure_positive(amount)?;

        self.commit(|ledgers, rng| {
            let available = ledgers.account(from).total_balance_usdt;
            if available < amount {
                return Err(BalanceError::InsufficientBalance {
                    account: from,
                    available,
                    requested: amount,
                });
            }

            let now = Utc::now().timestamp_millis();
            for (account, delta, action) in [
                (from, -amount, TxAction::TransferOut),
                (to, amount, TxAction::TransferIn),
            ] {
                let data = ledgers.account_mut(account);
                data.total_balance_usdt = checked_shift(data.total_balance_usdt, delta, account)?;
                data.balance_history = synthetic_history(data.total_balance_usdt, now, rng);
                let tx = make_tx(
                    NewTx {
                        action,
                        amount,
                        symbol: "USDT".to_string(),
                    },
                    rng,
                );
                push_tx(data, tx);
            }
            Ok(())
        })
        .await?;

        tracing::info!(%from, %to, %amount, "transfer completed");
        Ok(())
    }

    /// Credit `amount` (valued in USDT) to `account` and log a Deposit
    pub async fn deposit(&self, account: AccountType, symbol: &str, amount: Decimal) -> Result<Tx, BalanceError> {
        ensure_positive(amount)?;
        let tx = self
            .commit(|ledgers, rng| {
                let data = ledgers.account_mut(account);
                data.total_balance_usdt = checked_shift(data.total_balance_usdt, amount, account)?;
                data.balance_history =
                    synthetic_history(data.total_balance_usdt, Utc::now().timestamp_millis(), rng);
                let tx = make_tx(
                    NewTx {
                        action: TxAction::Deposit,
                        amount,
                        symbol: symbol.to_uppercase(),
                    },
                    rng,
                );
                push_tx(data, tx.clone());
                Ok(tx)
            })
            .await?;

        tracing::info!(%account, symbol, %amount, tx_id = %tx.tx_id, "deposit recorded");
        Ok(tx)
    }

    /// Debit `amount` (valued in USDT) from `account` and log a Withdraw
    pub async fn withdraw(&self, account: AccountType, symbol: &str, amount: Decimal) -> Result<Tx, BalanceError> {
        ensure_positive(amount)?;
        let tx = self
            .commit(|ledgers, rng| {
                let data = ledgers.account_mut(account);
                if data.total_balance_usdt < amount {
                    return Err(BalanceError::InsufficientBalance {
                        account,
                        available: data.total_balance_usdt,
                        requested: amount,
                    });
                }
                data.total_balance_usdt = checked_shift(data.total_balance_usdt, -amount, account)?;
                data.balance_history =
                    synthetic_history(data.total_balance_usdt, Utc::now().timestamp_millis(), rng);
                let tx = make_tx(
                    NewTx {
                        action: TxAction::Withdraw,
                        amount,
                        symbol: symbol.to_uppercase(),
                    },
                    rng,
                );
                push_tx(data, tx.clone());
                Ok(tx)
            })
            .await?;

        tracing::info!(%account, symbol, %amount, tx_id = %tx.tx_id, "withdrawal recorded");
        Ok(tx)
    }

    /// Apply `f` to a copy of the ledgers, persist it, then swap it in.
    /// The lock is held across the save so writes never interleave.
    async fn commit<T, F>(&self, f: F) -> Result<T, BalanceError>
    where
        F: FnOnce(&mut Ledgers, &mut StdRng) -> Result<T, BalanceError>,
    {
        let mut current = self.ledgers.lock().await;
        let mut next = current.clone();

        let out = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut next, &mut *rng)?
        };
        next.ensure_summable()?;

        self.store
            .save_account_balances(&next.snapshot(Utc::now().timestamp_millis()))
            .await?;
        *current = next;

        Ok(out)
    }
}
