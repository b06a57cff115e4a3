use clickeat_core::models::{Dish, StaffMember};

/// Currency the menu is priced in
const CURRENCY: &str = "UAH";

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

pub fn format_price(dish: &Dish) -> String {
    format!("{} {}", dish.price_display(), CURRENCY)
}

/// One menu line: id, name, price, and a marker for unavailable dishes
pub fn dish_line(dish: &Dish) -> String {
    let marker = if dish.is_available { "" } else { "  (unavailable)" };
    format!(
        "{:>4}  {:<32} {:>12}{}",
        dish.id,
        truncate_string(&dish.name, 32),
        format_price(dish),
        marker
    )
}

pub fn staff_line(member: &StaffMember) -> String {
    let status = if member.is_active { "active" } else { "inactive" };
    format!(
        "{:>4}  {:<28} {:<32} {:<14} {}",
        member.id,
        truncate_string(&member.full_name(), 28),
        truncate_string(&member.email, 32),
        member.role.display_name(),
        status
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickeat_core::models::Category;

    fn dish(available: bool) -> Dish {
        Dish {
            id: 7,
            name: "Varenyky with potato".into(),
            description: String::new(),
            price: "150".into(),
            photo_url: None,
            is_available: available,
            category: Category {
                id: 1,
                name: "Mains".into(),
                slug: "mains".into(),
            },
            ingredients: Vec::new(),
        }
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Борщ український", 7), "Борщ...");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(&dish(true)), "150.00 UAH");
    }

    #[test]
    fn test_dish_line_marks_unavailable() {
        assert!(!dish_line(&dish(true)).contains("unavailable"));
        assert!(dish_line(&dish(false)).ends_with("(unavailable)"));
    }
}
