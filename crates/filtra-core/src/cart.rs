//! # Cart
//!
//! The authoritative cart: request lines joined against catalog rows.
//!
//! ## Price Authority
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Client request            Catalog                 Cart                 │
//! │  ──────────────            ───────                 ────                 │
//! │  {product_id, qty}   +   {price, type, flags}  →  CartItem             │
//! │                                                                         │
//! │  The request never carries a usable price. A tampered client can       │
//! │  declare any subtotal it likes; the engine recomputes from catalog     │
//! │  rows and rejects on divergence.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{PricingError, PricingResult};
use crate::money::Money;
use crate::types::{CatalogProduct, ProductType, RequestLine};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// One priced cart line, frozen from a catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    /// Authoritative unit price at computation time.
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub product_type: ProductType,
    pub category_ids: Vec<String>,
    /// Effective exclusion: the catalog flag, or gift-card type.
    pub excluded_from_discount: bool,
}

impl CartItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    /// Whether discounts may apply to this line.
    #[inline]
    pub fn discountable(&self) -> bool {
        !self.excluded_from_discount
    }
}

/// A validated, fully priced cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Joins request lines against their catalog rows.
    ///
    /// ## Fatal conditions (checked before any computation)
    /// - no lines
    /// - more than [`MAX_CART_ITEMS`] lines
    /// - quantity outside `1..=MAX_ITEM_QUANTITY`
    /// - a line whose product id has no active catalog row
    ///
    /// `products` is whatever the catalog returned for the requested ids;
    /// order does not matter.
    pub fn build(lines: &[RequestLine], products: &[CatalogProduct]) -> PricingResult<Cart> {
        if lines.is_empty() {
            return Err(PricingError::EmptyCart);
        }
        if lines.len() > MAX_CART_ITEMS {
            return Err(PricingError::TooManyLines {
                max: MAX_CART_ITEMS,
            });
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity < 1 || line.quantity > MAX_ITEM_QUANTITY {
                return Err(PricingError::InvalidQuantity {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                });
            }

            let product = products
                .iter()
                .find(|p| p.id == line.product_id && p.is_active)
                .ok_or_else(|| PricingError::UnknownProduct {
                    product_id: line.product_id.clone(),
                })?;

            items.push(CartItem {
                product_id: product.id.clone(),
                sku: product.sku.clone(),
                name: product.name.clone(),
                unit_price_cents: product.price_cents,
                quantity: line.quantity,
                product_type: product.product_type,
                category_ids: product.category_ids.clone(),
                excluded_from_discount: !product.discountable(),
            });
        }

        Ok(Cart { items })
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Recomputed subtotal over every line.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(|i| i.line_total()).sum()
    }

    /// Subtotal over lines discounts are allowed to touch.
    pub fn discountable_subtotal(&self) -> Money {
        self.items
            .iter()
            .filter(|i| i.discountable())
            .map(|i| i.line_total())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.items.len()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
