use std::sync::OnceLock;

use regex::Regex;

struct Patterns {
    email: Regex,
    local_phone: Regex,
    intl_phone: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        email: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email pattern"),
        local_phone: Regex::new(r"\b\d{4}[-\s]?\d{4}\b").expect("phone pattern"),
        intl_phone: Regex::new(r"\+?\b\d{1,3}[-\s]?\d{3,4}[-\s]?\d{4}\b").expect("phone pattern"),
    })
}

/// Mask e-mail addresses as `[EMAIL]` and phone numbers as `[TELÉFONO]`.
pub fn anonymize(text: &str) -> String {
    let p = patterns();
    let text = p.email.replace_all(text, "[EMAIL]");
    let text = p.intl_phone.replace_all(&text, "[TELÉFONO]");
    p.local_phone.replace_all(&text, "[TELÉFONO]").into_owned()
}
