//! Name ordering for student listings.
//!
//! Comparison happens in two levels. The primary level ignores Arabic short
//! vowels and tatweel, folds alef and Persian letter variants onto their base
//! letters, folds Latin case and common accents, and orders classes as
//! punctuation, digits, Arabic, then everything else. Ties on the primary
//! level are broken by accents (plain letters first), then by case
//! (lowercase first), then by code point so the result is total.

use std::cmp::Ordering;

/// Compare two display names.
#[must_use]
pub fn compare(a: &str, b: &str) -> Ordering {
    primary(a)
        .cmp(primary(b))
        .then_with(|| accents(a).cmp(accents(b)))
        .then_with(|| uppercase(a).cmp(uppercase(b)))
        .then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Class {
    Punctuation,
    Digit,
    Arabic,
    Other,
}

fn primary(s: &str) -> impl Iterator<Item = (Class, u32)> + '_ {
    s.chars().filter_map(weight)
}

fn weight(c: char) -> Option<(Class, u32)> {
    let code = u32::from(c);
    match c {
        // harakat, Quranic marks, superscript alef, tatweel
        '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{0640}' => None,
        '0'..='9' => Some((Class::Digit, code - u32::from('0'))),
        '\u{0660}'..='\u{0669}' => Some((Class::Digit, code - 0x0660)),
        '\u{06F0}'..='\u{06F9}' => Some((Class::Digit, code - 0x06F0)),
        '\u{0621}'..='\u{064A}' | '\u{0671}'..='\u{06D3}' => Some((Class::Arabic, arabic(c))),
        c if c.is_whitespace() || c.is_ascii_punctuation() => {
            Some((Class::Punctuation, code))
        }
        c => Some((Class::Other, u32::from(fold_latin(c)))),
    }
}

fn weighted(s: &str) -> impl Iterator<Item = char> + '_ {
    s.chars().filter(|c| weight(*c).is_some())
}

fn accents(s: &str) -> impl Iterator<Item = bool> + '_ {
    weighted(s).map(|c| match c {
        'آ' | 'أ' | 'إ' | 'ٱ' => true,
        c => fold_latin(c) != lowercase(c),
    })
}

fn uppercase(s: &str) -> impl Iterator<Item = bool> + '_ {
    weighted(s).map(char::is_uppercase)
}

/// Arabic letters weighted by their base letter, leaving room after each base
/// for Persian additions.
fn arabic(c: char) -> u32 {
    let (base, offset) = match c {
        'آ' | 'أ' | 'إ' | 'ٱ' => ('ا', 0),
        'ک' => ('ك', 0),
        'ی' | 'ى' => ('ي', 0),
        'پ' => ('ب', 1),
        'چ' => ('ج', 1),
        'ژ' => ('ز', 1),
        'گ' => ('ك', 1),
        other => (other, 0),
    };
    (u32::from(base) << 2) + offset
}

fn lowercase(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn fold_latin(c: char) -> char {
    match lowercase(c) {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut out: Vec<String> = names.iter().map(|s| (*s).to_string()).collect();
        out.sort_by(|a, b| compare(a, b));
        out
    }

    #[test]
    fn arabic_names_follow_alphabet_order() {
        assert_eq!(
            sorted(&["يوسف", "سارة", "أحمد", "بلال"]),
            vec!["أحمد", "بلال", "سارة", "يوسف"]
        );
    }

    #[test]
    fn hamza_alef_sorts_with_bare_alef() {
        // أمل and ادريس share the base alef, so the second letter decides.
        assert_eq!(compare("أمل", "ادريس"), Ordering::Greater);
        assert_eq!(compare("إبراهيم", "احمد"), Ordering::Less);
    }

    #[test]
    fn diacritics_and_tatweel_are_ignored_at_primary_level() {
        assert_eq!(compare("مُحَمَّد", "محمود"), compare("محمد", "محمود"));
        assert_eq!(compare("علـــي", "عمر"), Ordering::Less);
        // Identical primary weights fall back to code points.
        assert_ne!(compare("مُحَمَّد", "محمد"), Ordering::Equal);
    }

    #[test]
    fn arabic_script_sorts_before_latin() {
        assert_eq!(sorted(&["Zed", "aya", "ليلى"]), vec!["ليلى", "aya", "Zed"]);
    }

    #[test]
    fn latin_case_and_accents_fold() {
        assert_eq!(sorted(&["Zoe", "élise", "Emma"]), vec!["élise", "Emma", "Zoe"]);
    }

    #[test]
    fn lowercase_sorts_before_uppercase_on_ties() {
        assert_eq!(sorted(&["Aya", "aya"]), vec!["aya", "Aya"]);
        assert_eq!(compare("a", "A"), Ordering::Less);
    }

    #[test]
    fn plain_letters_sort_before_accented_on_ties() {
        assert_eq!(
            sorted(&["élise", "Elise", "elise"]),
            vec!["elise", "Elise", "élise"]
        );
        assert_eq!(compare("ادم", "آدم"), Ordering::Less);
    }

    #[test]
    fn digits_compare_by_value_across_scripts() {
        // Same value, so only the code point tie-break separates them.
        assert_eq!(compare("٣", "3"), Ordering::Greater);
        assert_eq!(compare("٢", "3"), Ordering::Less);
    }

    #[test]
    fn persian_letters_follow_their_base_letter() {
        assert_eq!(sorted(&["تارا", "پری", "بهار"]), vec!["بهار", "پری", "تارا"]);
    }
}
