//! Pre-rendered user-facing strings. Notification text is baked in at write
//! time, so these are the only place wording lives.

/// Whole-unit price with thousands separators, e.g. `$1,500`.
pub fn format_price(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

pub fn greeting(product_name: &str) -> String {
    format!("Hi! I'm interested in \"{}\".", product_name)
}

pub fn bid_placed(price: i64) -> String {
    format!("Made an offer of {}.", format_price(price))
}

pub fn bid_accepted(price: i64, product_name: &str) -> String {
    format!(
        "Accepted the offer of {}. \"{}\" is now sold.",
        format_price(price),
        product_name
    )
}

pub fn bid_declined(price: i64) -> String {
    format!("Declined the offer of {}.", format_price(price))
}

pub fn bid_cancelled(price: i64) -> String {
    format!("Withdrew the offer of {}.", format_price(price))
}

pub fn sold_header(final_price: i64) -> String {
    format!("Sold for {}", format_price(final_price))
}

pub fn new_message(sender_name: &str, text: &str) -> String {
    format!("{}: {}", sender_name, preview(text))
}

pub fn new_favorite(liker_name: &str, product_name: &str) -> String {
    format!("{} added \"{}\" to their favorites.", liker_name, product_name)
}

pub fn price_drop(product_name: &str, old_price: i64, new_price: i64) -> String {
    format!(
        "\"{}\" dropped from {} to {}.",
        product_name,
        format_price(old_price),
        format_price(new_price)
    )
}

pub fn item_sold(product_name: &str) -> String {
    format!("Your item \"{}\" has been sold.", product_name)
}

pub fn new_review(reviewer_name: &str, rating: i32) -> String {
    format!("{} left you a {}-star review.", reviewer_name, rating)
}

const PREVIEW_CHARS: usize = 100;

/// First line-ish chunk of a message for push bodies.
pub fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push('…');
    }
    out
}
