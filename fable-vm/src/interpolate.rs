// fable-vm - String interpolation
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! String-template expansion with ordered positional placeholders.
//!
//! `${N}` substitutes argument `N` (base-10, zero-based). A backslash
//! escapes the following character, which is emitted verbatim. A
//! substitution that is unterminated, fails to parse, or indexes out of
//! range is abandoned: the literal `$` is emitted and scanning continues
//! from the character after it, so the rest of the placeholder text comes
//! through unchanged.

/// Expand `${N}` placeholders in `template` from `args`.
pub fn interpolate(template: &str, args: &[String]) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut result = String::with_capacity(template.len());
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        if c == '\\' {
            pos += 1;
            if pos < chars.len() {
                result.push(chars[pos]);
                pos += 1;
            }
            continue;
        }

        if c == '$' && pos + 1 < chars.len() && chars[pos + 1] == '{' {
            let mut scan = pos + 2;
            let mut index_text = String::new();
            while scan < chars.len() && chars[scan] != '}' {
                index_text.push(chars[scan]);
                scan += 1;
            }

            let mut substituted = false;
            if scan < chars.len() {
                if let Ok(index) = index_text.parse::<i32>() {
                    if index >= 0 && (index as usize) < args.len() {
                        result.push_str(&args[index as usize]);
                        substituted = true;
                    }
                }
            }

            if substituted {
                pos = scan + 1;
            } else {
                // Abandon the substitution: emit the '$' and rescan from
                // the character after it.
                result.push('$');
                pos += 1;
            }
            continue;
        }

        result.push(c);
        pos += 1;
    }

    result
}
