//! Package catalog helpers

/// Parse a package's free-text session descriptor into a session count.
///
/// Descriptors are written for guardians, e.g. `"4 جلسات فردية"` or
/// `"جلسة واحدة"`. Digits (ASCII or Arabic-Indic) win; otherwise a number
/// word is looked up; a bare singular "session" means one.
pub fn parse_session_count(descriptor: &str) -> Option<u32> {
    if let Some(n) = leading_number(descriptor) {
        return (n > 0).then_some(n);
    }

    for word in descriptor.split_whitespace() {
        if let Some(n) = number_word(word) {
            return Some(n);
        }
    }

    let lower = descriptor.to_lowercase();
    let singular = (lower.contains("جلسة") && !lower.contains("جلسات"))
        || lower.split_whitespace().any(|w| w == "session");
    singular.then_some(1)
}

fn digit_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        '\u{0660}'..='\u{0669}' => Some(c as u32 - 0x0660),
        '\u{06F0}'..='\u{06F9}' => Some(c as u32 - 0x06F0),
        _ => None,
    }
}

fn leading_number(s: &str) -> Option<u32> {
    let mut value: Option<u32> = None;
    for c in s.chars() {
        match (digit_value(c), value) {
            (Some(d), v) => value = Some(v.unwrap_or(0).checked_mul(10)?.checked_add(d)?),
            (None, Some(_)) => break,
            (None, None) => {}
        }
    }
    value
}

fn number_word(word: &str) -> Option<u32> {
    let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    let n = match word.as_str() {
        "واحدة" | "واحد" | "one" | "single" => 1,
        "جلستان" | "جلستين" | "اثنتان" | "اثنتين" | "اثنان" | "اثنين" | "two" => 2,
        "ثلاث" | "ثلاثة" | "three" => 3,
        "أربع" | "اربع" | "أربعة" | "اربعة" | "four" => 4,
        "خمس" | "خمسة" | "five" => 5,
        "ست" | "ستة" | "six" => 6,
        "سبع" | "سبعة" | "seven" => 7,
        "ثمان" | "ثماني" | "ثمانية" | "eight" => 8,
        "تسع" | "تسعة" | "nine" => 9,
        "عشر" | "عشرة" | "ten" => 10,
        _ => return None,
    };
    Some(n)
}
