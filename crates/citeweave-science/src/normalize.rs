//! Canonical text form for equality comparison of titles, names and keywords.
//!
//! The output is never stored; it exists only to decide whether two strings
//! denote the same thing.

use std::borrow::Cow;

use quick_xml::escape::unescape_with;
use unicode_normalization::UnicodeNormalization;

/// Lower-cases, transliterates to ASCII, unescapes HTML entities, strips
/// punctuation, collapses whitespace and unifies `optimis`/`optimiz`.
///
/// `normalize(&normalize(s)) == normalize(s)` for every `s`.
pub fn normalize(text: &str) -> String {
    let unescaped = unescape_entities(text);

    let ascii: String = unescaped
        .chars()
        .fold(String::with_capacity(unescaped.len()), |mut acc, c| {
            match transliterate(c) {
                Some(s) => acc.push_str(s),
                None => acc.push(c),
            }
            acc
        })
        .nfkd()
        .filter(|c| c.is_ascii() && (!c.is_ascii_control() || c.is_ascii_whitespace()))
        .map(|c| c.to_ascii_lowercase())
        .filter_map(strip_punctuation)
        .collect();

    ascii
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("optimis", "optimiz")
}

/// Entities are resolved token by token so one stray `&` does not keep
/// the rest of the text escaped.
fn unescape_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    if let Ok(all) = unescape_with(text, resolve_entity) {
        return all;
    }
    let tokens: Vec<Cow<'_, str>> = text
        .split_whitespace()
        .map(|token| unescape_with(token, resolve_entity).unwrap_or(Cow::Borrowed(token)))
        .collect();
    Cow::Owned(tokens.join(" "))
}

fn resolve_entity(entity: &str) -> Option<&'static str> {
    let resolved = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" | "mdash" | "minus" => "-",
        "lsquo" | "rsquo" => "'",
        "ldquo" | "rdquo" => "\"",
        "hellip" => "...",
        _ => return None,
    };
    Some(resolved)
}

/// Letterforms that canonical decomposition leaves untouched.
fn transliterate(c: char) -> Option<&'static str> {
    let s = match c {
        'ß' => "ss",
        'ẞ' => "SS",
        'ø' => "o",
        'Ø' => "O",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        'ł' => "l",
        'Ł' => "L",
        'đ' | 'ð' => "d",
        'Đ' | 'Ð' => "D",
        'þ' => "th",
        'Þ' => "TH",
        'ı' => "i",
        '‐' | '‑' | '‒' | '–' | '—' => "-",
        '‘' | '’' => "'",
        '“' | '”' => "\"",
        _ => return None,
    };
    Some(s)
}

fn strip_punctuation(c: char) -> Option<char> {
    match c {
        '-' | '[' | '\\' => Some(' '),
        '/' | '?' | '&' | '"' | '\'' | '!' | '@' | '#' | '$' | '^' | '*' | '=' | '`' | ':'
        | ';' | '|' | '~' | '{' | '}' | ']' => None,
        _ => Some(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_case_and_diacritics() {
        assert_eq!(normalize("Müller–Lyon Ørsted"), "muller lyon orsted");
        assert_eq!(normalize("Straße"), "strasse");
        assert_eq!(normalize("Łukasz Żółć"), "lukasz zolc");
    }

    #[test]
    fn unescapes_html_entities() {
        assert_eq!(normalize("Search &amp; Rescue"), "search rescue");
        assert_eq!(normalize("A&lt;B &#233;t&#xE9;"), "a<b ete");
        assert_eq!(normalize("R&D &amp; more"), "rd more");
    }

    #[test]
    fn strips_listed_punctuation() {
        assert_eq!(
            normalize("Multi-objective {PSO}: a \"review\"!"),
            "multi objective pso a review"
        );
        assert_eq!(normalize("a/b [c] d\\e"), "ab c d e");
        assert_eq!(normalize("  lots \t of\n space  "), "lots of space");
    }

    #[test]
    fn unifies_british_spelling() {
        assert_eq!(normalize("Particle Swarm Optimisation"), "particle swarm optimization");
        assert_eq!(
            normalize("Particle swarm optimization"),
            normalize("PARTICLE SWARM OPTIMISATION")
        );
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            "",
            "   ",
            "&amp;amp;",
            "&#38;lt;",
            "Optimisation-based optimis-ation",
            "Ⅻ ℍilbert ﬁnite ½",
            "Über die Ǆ-Ströme; Teil 1",
            "C++ & C#: \"fast\" \\ [slow]",
            "日本語のタイトル with Latin",
            "\u{0}\u{7} control\u{1b}chars",
            "optimoptimisis",
            "ıstanbul Đorđe ẞ",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }
}
