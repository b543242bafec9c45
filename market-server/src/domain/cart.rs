use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// A cart line joined against the current product record. Price is the
/// product's price right now, not the price at add time.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub image_path: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub total: Decimal,
}

pub fn cart_total(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.price * Decimal::from(line.quantity))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: Decimal, quantity: i32) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            name: "item".to_string(),
            price,
            image_path: None,
            quantity,
        }
    }

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(cart_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn total_is_sum_of_price_times_quantity() {
        let lines = vec![
            line(Decimal::new(999, 2), 5),  // 9.99 x 5
            line(Decimal::new(1250, 2), 2), // 12.50 x 2
        ];
        assert_eq!(cart_total(&lines), Decimal::new(7495, 2));
    }

    #[test]
    fn total_follows_current_price() {
        let mut lines = vec![line(Decimal::new(1000, 2), 3)];
        assert_eq!(cart_total(&lines), Decimal::new(3000, 2));
        // A price change on the product is reflected on the next read.
        lines[0].price = Decimal::new(500, 2);
        assert_eq!(cart_total(&lines), Decimal::new(1500, 2));
    }
}
