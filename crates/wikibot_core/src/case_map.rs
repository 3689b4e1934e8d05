//! First-letter case folding for page titles.
//!
//! Titles are upper-cased one character at a time with the same rules the
//! wiki's server side applies: a character whose generic upper-case form
//! expands to several characters (`ß`, ligatures, Armenian `և`, ...) is left
//! as-is, Greek letters carrying a ypogegrammeni map to their title-case form,
//! and a handful of scripts the server never upper-cases stay untouched.

/// Upper-case the first character of `value`, leaving the rest unchanged.
pub fn upper_first(value: &str) -> String {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut output = String::with_capacity(value.len() + 2);
    output.push(upper_char(first));
    output.push_str(chars.as_str());
    output
}

/// Map a single character to its upper-case form, always yielding exactly one character.
pub fn upper_char(ch: char) -> char {
    if let Some(mapped) = override_for(ch) {
        return mapped;
    }
    let mut upper = ch.to_uppercase();
    if upper.len() != 1 {
        return ch;
    }
    upper.next().unwrap_or(ch)
}

fn override_for(ch: char) -> Option<char> {
    let code = u32::from(ch);
    match code {
        // Georgian Mkhedruli has no upper case on the server.
        0x10D0..=0x10FA | 0x10FD..=0x10FF => Some(ch),
        // Latin title-case digraphs are already in their first-letter form.
        0x01C5 | 0x01C8 | 0x01CB | 0x01F2 => Some(ch),
        // Greek with ypogegrammeni: lower-case rows map onto the title-case rows,
        // the title-case rows themselves stay put.
        0x1F80..=0x1F87 | 0x1F90..=0x1F97 | 0x1FA0..=0x1FA7 => char::from_u32(code + 8),
        0x1F88..=0x1F8F | 0x1F98..=0x1F9F | 0x1FA8..=0x1FAF => Some(ch),
        0x1FB3 => Some('\u{1FBC}'),
        0x1FC3 => Some('\u{1FCC}'),
        0x1FF3 => Some('\u{1FFC}'),
        0x1FBC | 0x1FCC | 0x1FFC => Some(ch),
        _ => None,
    }
}
