//! Cyrillic transliteration and URL slugs.

const MAX_SLUG_LEN: usize = 80;

/// Latin spelling of a lowercase Russian letter, `None` for anything else.
fn latin_for(lower: char) -> Option<&'static str> {
    let latin = match lower {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    };
    Some(latin)
}

/// Replaces Russian letters with their Latin spelling, keeping the case of the first
/// letter (`Щ` becomes `Shch`). Everything else is copied as is.
pub fn transliterate(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let lower = ch.to_lowercase().next().unwrap_or(ch);
        match latin_for(lower) {
            Some(latin) if ch != lower => {
                let mut letters = latin.chars();
                if let Some(first) = letters.next() {
                    out.push(first.to_ascii_uppercase());
                    out.extend(letters);
                }
            }
            Some(latin) => out.push_str(latin),
            None => out.push(ch),
        }
    }
    out
}

pub fn slugify(input: &str) -> String {
    let latin = transliterate(input).to_lowercase();

    let mut slug = String::with_capacity(latin.len());
    let mut pending_dash = false;
    for ch in latin.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        if let Some(dash) = slug.rfind('-').filter(|&i| i >= MAX_SLUG_LEN / 2) {
            slug.truncate(dash);
        }
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

/// `base` shortened so that `base-{suffix}` fits in a slug.
fn with_suffix(base: &str, suffix: u32) -> String {
    let suffix = format!("-{suffix}");
    let room = MAX_SLUG_LEN.saturating_sub(suffix.len());
    let stem = base.get(..room.min(base.len())).unwrap_or(base).trim_end_matches('-');
    format!("{stem}{suffix}")
}

/// First of `base`, `base-2`, `base-3`, ... for which `taken` is false. Suffixed
/// candidates never exceed the slug length limit.
pub fn unique_slug<E>(
    base: &str,
    mut taken: impl FnMut(&str) -> Result<bool, E>,
) -> Result<String, E> {
    if !taken(base)? {
        return Ok(base.to_string());
    }
    let mut n = 2u32;
    loop {
        let candidate = with_suffix(base, n);
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn transliterates_words() {
        assert_eq!(transliterate("Привет"), "Privet");
        assert_eq!(transliterate("Щука"), "Shchuka");
        assert_eq!(transliterate("жёлтый"), "zhyoltyy");
        assert_eq!(transliterate("подъезд"), "podezd");
        assert_eq!(transliterate("Дом 5, кв. 12"), "Dom 5, kv. 12");
        assert_eq!(transliterate("ÉTÉ"), "ÉTÉ");
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Собрание жильцов 12 мая!"), "sobranie-zhiltsov-12-maya");
        assert_eq!(slugify("  --Hello,   World--  "), "hello-world");
        assert_eq!(slugify("!!!"), "item");
    }

    #[test]
    fn long_slugs_cut_on_dash() {
        let title = "слово ".repeat(30);
        let slug = slugify(&title);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
        assert!(slug.split('-').all(|part| part == "slovo"));
    }

    #[test]
    fn unique_suffixes() {
        let taken: HashSet<&str> = ["news", "news-2"].into_iter().collect();
        let slug = unique_slug::<()>("news", |s| Ok(taken.contains(s))).unwrap();
        assert_eq!(slug, "news-3");
        let slug = unique_slug::<()>("fresh", |s| Ok(taken.contains(s))).unwrap();
        assert_eq!(slug, "fresh");
    }

    #[test]
    fn suffixed_slugs_stay_within_limit() {
        let base = format!("{}-bc", "a".repeat(MAX_SLUG_LEN - 3));
        let slug = unique_slug::<()>(&base, |s| Ok(s == base)).unwrap();
        assert_eq!(slug, format!("{}-2", "a".repeat(MAX_SLUG_LEN - 3)));

        let full = "a".repeat(MAX_SLUG_LEN);
        let mut seen = 0;
        let slug = unique_slug::<()>(&full, |_| {
            seen += 1;
            Ok(seen < 12)
        })
        .unwrap();
        assert_eq!(slug.len(), MAX_SLUG_LEN);
        assert!(slug.ends_with("-12"));
    }
}
