//! # Place Order
//!
//! Settles one order at the register.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ── transaction ─────────────────────────────────────────────────────── │
//! │  1. session      must exist, belong to the tenant, and be open          │
//! │  2. price lines  subtotal, line discounts, tax, pre-code total          │
//! │  3. code         resolve and validate (no write yet)                    │
//! │  4. tender       reconcile against the post-discount total              │
//! │  5. persist      order number → order → code usage → payments           │
//! │  6. session      total_sales += total, order_count += 1                 │
//! │  ── commit ──────────────────────────────────────────────────────────── │
//! │  7. events       DiscountCodeApplied? SplitPaymentProcessed?            │
//! │                  PosOrderPlaced (always last)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every check in steps 1-4 runs before the first write, and so does the
//! range check on the new session totals. A failure anywhere rolls the whole
//! transaction back and no event is dispatched. So does dropping the future
//! before commit.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use tally_core::error::CoreError;
use tally_core::events::{
    DiscountCodeApplied, DomainEvent, PosOrderPlaced, SplitPaymentProcessed,
};
use tally_core::money::Money;
use tally_core::payment::{reconcile, PaymentEntry, Tender};
use tally_core::pricing::price_order;
use tally_core::types::{
    NewPosOrder, OrderLineInput, OrderStatus, PaymentMethod, PosOrder, PosOrderPayment,
    PosSession,
};

use crate::error::AppResult;
use crate::ports::{
    run_in_transaction, DiscountRepository, EventDispatcher, OrderRepository, PaymentRepository,
    SessionRepository, TransactionManager,
};
use crate::use_cases::discount_applicator::DiscountCodeApplicator;

/// Order placement request.
///
/// Either `payments` (split tender) or `payment_method` (legacy single
/// tender) must be given. A non-empty `payments` wins.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaceOrderInput {
    pub tenant_id: String,
    pub session_id: String,
    pub created_by: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub lines: Vec<OrderLineInput>,
    #[serde(default)]
    pub discount_code: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payments: Vec<PaymentEntry>,
    #[serde(default)]
    pub cash_tendered: Option<Money>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrderOutput {
    pub order: PosOrder,
    /// Empty when no payment repository is configured.
    pub payments: Vec<PosOrderPayment>,
    /// Cash handed back to the customer.
    pub change: Money,
    /// The session after its counters were bumped.
    pub session: PosSession,
}

pub struct PlaceOrderUseCase {
    sessions: Arc<dyn SessionRepository>,
    orders: Arc<dyn OrderRepository>,
    payments: Option<Arc<dyn PaymentRepository>>,
    discounts: DiscountCodeApplicator,
    tx: Arc<dyn TransactionManager>,
    events: Arc<dyn EventDispatcher>,
}

impl PlaceOrderUseCase {
    /// Creates the use case without payment or discount repositories.
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        orders: Arc<dyn OrderRepository>,
        tx: Arc<dyn TransactionManager>,
        events: Arc<dyn EventDispatcher>,
    ) -> Self {
        Self {
            sessions,
            orders,
            payments: None,
            discounts: DiscountCodeApplicator::new(None),
            tx,
            events,
        }
    }

    /// Records a payment row per tender entry.
    pub fn with_payments(mut self, payments: Arc<dyn PaymentRepository>) -> Self {
        self.payments = Some(payments);
        self
    }

    /// Enables discount codes.
    pub fn with_discounts(mut self, discounts: Arc<dyn DiscountRepository>) -> Self {
        self.discounts = DiscountCodeApplicator::new(Some(discounts));
        self
    }

    pub async fn execute(&self, input: PlaceOrderInput) -> AppResult<PlaceOrderOutput> {
        debug!(
            tenant_id = %input.tenant_id,
            session_id = %input.session_id,
            lines = input.lines.len(),
            "Placing order"
        );

        let (output, events) = run_in_transaction(self.tx.as_ref(), self.place(input)).await?;

        info!(
            order_id = %output.order.id,
            order_number = %output.order.order_number,
            total = %output.order.total,
            "Order placed"
        );

        for event in events {
            self.events.dispatch(event).await;
        }

        Ok(output)
    }

    async fn place(&self, input: PlaceOrderInput) -> AppResult<(PlaceOrderOutput, Vec<DomainEvent>)> {
        // 1. Session
        let session = self
            .sessions
            .find_by_id(&input.session_id)
            .await?
            .filter(|s| s.tenant_id == input.tenant_id)
            .ok_or_else(|| CoreError::not_found("POS session", input.session_id.as_str()))?;
        session.ensure_open()?;

        // 2. Lines
        let totals = price_order(&input.lines)?;
        debug!(
            subtotal = %totals.subtotal,
            tax = %totals.tax_amount,
            total = %totals.total,
            "Lines priced"
        );

        // 3. Discount code
        let discount = self
            .discounts
            .resolve(
                &input.tenant_id,
                input.discount_code.as_deref(),
                totals.total,
                Utc::now(),
            )
            .await?;

        // 4. Tender
        let tender = Tender::from_parts(input.payment_method, input.payments, input.cash_tendered)?;
        let settlement = reconcile(&tender, discount.total)?;

        // 5. Persist
        let discount_amount = totals
            .line_discount
            .checked_add(discount.discount_amount)
            .map_err(CoreError::from)?;
        let session_totals = session.totals_after_sale(discount.total)?;
        let order_number = self.orders.next_number(&input.tenant_id).await?;
        let order = self
            .orders
            .create(NewPosOrder {
                tenant_id: input.tenant_id.clone(),
                session_id: session.id.clone(),
                order_number,
                customer_id: input.customer_id.clone(),
                status: OrderStatus::Paid,
                subtotal: totals.subtotal,
                discount_amount,
                tax_amount: totals.tax_amount,
                total: discount.total,
                discount_code_id: discount.discount_code_id.clone(),
                created_by: input.created_by,
                lines: totals.lines,
            })
            .await?;

        self.discounts.consume(&discount).await?;

        let mut payments = Vec::with_capacity(settlement.payments.len());
        match &self.payments {
            Some(repo) => {
                for payment in &settlement.payments {
                    payments.push(repo.create(payment.for_order(&order.id)).await?);
                }
            }
            None => debug!(
                order_id = %order.id,
                "No payment repository configured, payments not recorded"
            ),
        }

        // 6. Session counters
        let session = self
            .sessions
            .update_totals(&session.id, session_totals)
            .await?;

        // 7. Events, PosOrderPlaced last
        let mut events = Vec::with_capacity(3);
        if let (Some(discount_id), Some(code)) = (&discount.discount_code_id, &discount.code) {
            events.push(
                DiscountCodeApplied {
                    order_id: order.id.clone(),
                    tenant_id: order.tenant_id.clone(),
                    discount_id: discount_id.clone(),
                    code: code.clone(),
                    discount_amount: discount.discount_amount,
                }
                .into(),
            );
        }
        if settlement.is_split {
            events.push(
                SplitPaymentProcessed {
                    order_id: order.id.clone(),
                    payment_count: tender.entry_count(),
                }
                .into(),
            );
        }
        events.push(
            PosOrderPlaced {
                order_id: order.id.clone(),
                tenant_id: order.tenant_id.clone(),
                lines: order.lines.clone(),
                customer_id: order.customer_id.clone(),
                total_amount: order.total,
            }
            .into(),
        );

        let output = PlaceOrderOutput {
            order,
            payments,
            change: settlement.change,
            session,
        };
        Ok((output, events))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
