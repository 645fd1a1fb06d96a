//! English number words to integers.

fn small(word: &str) -> Option<u64> {
    let v = match word {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(v)
}

fn scale(word: &str) -> Option<u64> {
    match word {
        "thousand" => Some(1_000),
        "million" => Some(1_000_000),
        "billion" => Some(1_000_000_000),
        _ => None,
    }
}

/// Parses the number words in `text`, ignoring every other word.
///
/// `"the answer is twenty-seven"` gives 27 and
/// `"one hundred and five"` gives 105. Returns `None` when `text` holds no
/// number word or the value overflows.
pub fn words_to_number(text: &str) -> Option<u64> {
    let lower = text.to_lowercase();
    let words = lower
        .split(|c: char| c.is_whitespace() || c == '-')
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty());

    let mut total: u64 = 0;
    let mut current: u64 = 0;
    let mut seen = false;
    for word in words {
        if let Some(v) = small(word) {
            current = current.checked_add(v)?;
            seen = true;
        } else if word == "hundred" {
            current = current.max(1).checked_mul(100)?;
            seen = true;
        } else if let Some(s) = scale(word) {
            total = total.checked_add(current.max(1).checked_mul(s)?)?;
            current = 0;
            seen = true;
        }
    }
    if !seen {
        return None;
    }
    total.checked_add(current)
}
