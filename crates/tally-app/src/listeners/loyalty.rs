//! # Loyalty Auto-Accrual
//!
//! Credits points to the paying customer whenever an order is placed.
//!
//! ## Failure Containment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PosOrderPlaced                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PosOrderPlacedLoyaltyListener         never fails                      │
//! │   ├── tenant empty        ─► skip                                       │
//! │   ├── no customer         ─► skip                                       │
//! │   ├── total ≤ 0           ─► skip                                       │
//! │   ├── no active program   ─► skip                                       │
//! │   ▼                                                                     │
//! │  BestEffortAccrual                     Err ─► warn! + None              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  AccrueLoyaltyPointsUseCase            may fail (domain or storage)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The order has already committed when this runs. Nothing here can undo
//! or block it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use tally_core::events::{DomainEvent, PosOrderPlaced};

use crate::ports::{Accrual, AccrualRequest, EventListener, LoyaltyRepository, PointsAccrual};

/// Wraps an accrual so that every failure becomes a log line.
pub struct BestEffortAccrual<A> {
    inner: A,
}

impl<A: PointsAccrual> BestEffortAccrual<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    /// `None` when the wrapped accrual failed.
    pub async fn accrue(&self, request: AccrualRequest) -> Option<Accrual> {
        let reference = request.reference.clone();

        match self.inner.accrue(request).await {
            Ok(accrual) => Some(accrual),
            Err(err) => {
                warn!(
                    error = %err,
                    kind = ?err.kind(),
                    reference = ?reference,
                    "Loyalty accrual failed, order unaffected"
                );
                None
            }
        }
    }
}

/// Accrues points for `PosOrderPlaced`; ignores every other event.
pub struct PosOrderPlacedLoyaltyListener<A> {
    loyalty: Arc<dyn LoyaltyRepository>,
    accrual: BestEffortAccrual<A>,
}

impl<A: PointsAccrual> PosOrderPlacedLoyaltyListener<A> {
    pub fn new(loyalty: Arc<dyn LoyaltyRepository>, accrual: A) -> Self {
        Self {
            loyalty,
            accrual: BestEffortAccrual::new(accrual),
        }
    }

    /// Returns the accrual when one happened.
    pub async fn on_order_placed(&self, event: &PosOrderPlaced) -> Option<Accrual> {
        if event.tenant_id.trim().is_empty() {
            debug!(order_id = %event.order_id, "No tenant on order, skipping loyalty");
            return None;
        }
        let customer_id = match event.customer_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                debug!(order_id = %event.order_id, "No customer on order, skipping loyalty");
                return None;
            }
        };
        if !event.total_amount.is_positive() {
            debug!(order_id = %event.order_id, "Order total not positive, skipping loyalty");
            return None;
        }

        let program = match self.loyalty.find_active_by_tenant(&event.tenant_id).await {
            Ok(Some(program)) => program,
            Ok(None) => {
                debug!(tenant_id = %event.tenant_id, "No active loyalty program, skipping");
                return None;
            }
            Err(err) => {
                warn!(error = %err, order_id = %event.order_id, "Loyalty program lookup failed");
                return None;
            }
        };

        self.accrual
            .accrue(AccrualRequest {
                tenant_id: event.tenant_id.clone(),
                program_id: program.id,
                customer_id: customer_id.to_string(),
                order_amount: event.total_amount,
                reference: Some(event.order_id.clone()),
            })
            .await
    }
}

#[async_trait]
impl<A: PointsAccrual> EventListener for PosOrderPlacedLoyaltyListener<A> {
    fn name(&self) -> &'static str {
        "loyalty_auto_accrual"
    }

    async fn handle(&self, event: &DomainEvent) {
        if let DomainEvent::PosOrderPlaced(placed) = event {
            self.on_order_placed(placed).await;
        }
    }
}
