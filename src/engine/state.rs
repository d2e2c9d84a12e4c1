use chrono::{DateTime, Utc};

/// Base balance at or below this is treated as holding nothing.
pub const DUST_THRESHOLD: f64 = 0.00001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

/// The single logical position. Exactly one exists per process lifetime,
/// mutated only through the methods here.
///
/// Invariant: `entry_price`, `entry_time` and `quantity` are `Some` iff
/// `state == Long`.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    state: PositionState,
    entry_price: Option<f64>,
    entry_time: Option<DateTime<Utc>>,
    quantity: Option<f64>,
}

impl Position {
    pub fn flat() -> Self {
        Self {
            state: PositionState::Flat,
            entry_price: None,
            entry_time: None,
            quantity: None,
        }
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn is_long(&self) -> bool {
        self.state == PositionState::Long
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.entry_price
    }

    pub fn entry_time(&self) -> Option<DateTime<Utc>> {
        self.entry_time
    }

    pub fn quantity(&self) -> Option<f64> {
        self.quantity
    }

    pub fn open(&mut self, entry_price: f64, entry_time: DateTime<Utc>, quantity: f64) {
        self.state = PositionState::Long;
        self.entry_price = Some(entry_price);
        self.entry_time = Some(entry_time);
        self.quantity = Some(quantity);
    }

    /// Close out, clearing entry data regardless of which exit path fired.
    pub fn close(&mut self) {
        self.state = PositionState::Flat;
        self.entry_price = None;
        self.entry_time = None;
        self.quantity = None;
    }

    /// Reconcile against the freshly fetched base balance: a holding at or
    /// below dust means we are flat, whatever this process thinks.
    pub fn reconcile_balance(&mut self, base_balance: f64) {
        if base_balance <= DUST_THRESHOLD && self.is_long() {
            tracing::info!(
                "base balance {:.6} at or below dust, resetting position to flat",
                base_balance
            );
            self.close();
        }
    }

    /// Unrealized P/L in quote currency and percent, if long.
    pub fn unrealized_pnl(&self, current_price: f64) -> Option<(f64, f64)> {
        let entry = self.entry_price?;
        let quantity = self.quantity?;
        let usd = (current_price - entry) * quantity;
        let pct = (current_price - entry) / entry * 100.0;
        Some((usd, pct))
    }
}

/// Process-scoped state carried across cycles. The former loop globals of
/// this bot live here as explicit fields owned by the cycle driver.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleState {
    pub position: Position,
    /// Start time of the last candle whose market data was processed.
    /// In-memory only; restarting the process re-arms the buy gate.
    pub last_candle_start: Option<DateTime<Utc>>,
    /// Operator-visible flag: a momentum-loss exit fired while MACD was
    /// above the signal line. Cleared whenever MACD drops below it.
    pub momentum_exit_armed: bool,
}

impl CycleState {
    pub fn new() -> Self {
        Self {
            position: Position::flat(),
            last_candle_start: None,
            momentum_exit_armed: false,
        }
    }
}

impl Default for CycleState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_fields_set_iff_long() {
        let mut position = Position::flat();
        assert!(position.entry_price().is_none());
        assert!(position.entry_time().is_none());
        assert!(position.quantity().is_none());

        position.open(1800.0, Utc::now(), 0.6);
        assert!(position.is_long());
        assert_eq!(position.entry_price(), Some(1800.0));
        assert!(position.entry_time().is_some());
        assert_eq!(position.quantity(), Some(0.6));

        position.close();
        assert!(!position.is_long());
        assert!(position.entry_price().is_none());
        assert!(position.entry_time().is_none());
        assert!(position.quantity().is_none());
    }

    #[test]
    fn test_dust_balance_resets_to_flat() {
        let mut position = Position::flat();
        position.open(1800.0, Utc::now(), 0.6);

        position.reconcile_balance(0.000005);
        assert!(!position.is_long());
        assert!(position.entry_price().is_none());
    }

    #[test]
    fn test_balance_above_dust_keeps_position() {
        let mut position = Position::flat();
        position.open(1800.0, Utc::now(), 0.6);

        position.reconcile_balance(0.6);
        assert!(position.is_long());
        assert_eq!(position.entry_price(), Some(1800.0));
    }

    #[test]
    fn test_unrealized_pnl() {
        let mut position = Position::flat();
        assert!(position.unrealized_pnl(2000.0).is_none());

        position.open(2000.0, Utc::now(), 1.5);
        let (usd, pct) = position.unrealized_pnl(2060.0).unwrap();
        assert!((usd - 90.0).abs() < 1e-9);
        assert!((pct - 3.0).abs() < 1e-9);
    }
}
