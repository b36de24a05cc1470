//! OSC address pattern matching.
//!
//! Grammar:
//! - `*` matches any run of characters, including none
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[!a-z]` match one character from (or not from) a class
//! - `{foo,bar}` matches any one of the comma-separated literals
//! - `\x` matches a literal `x`
//!
//! Matching is bytewise and recursive over slices; every step consumes from
//! the front of the pattern, the candidate, or both.

/// Whether `candidate` is matched by `pattern`.
pub fn pattern_match(pattern: &str, candidate: &str) -> bool {
    match_bytes(pattern.as_bytes(), candidate.as_bytes())
}

fn match_bytes(pattern: &[u8], candidate: &[u8]) -> bool {
    let Some((&head, rest)) = pattern.split_first() else {
        return candidate.is_empty();
    };

    let Some((&first, tail)) = candidate.split_first() else {
        // Only `*` can consume nothing.
        return head == b'*' && match_bytes(rest, candidate);
    };

    match head {
        b'?' => match_bytes(rest, tail),
        b'*' => match_bytes(rest, candidate) || match_bytes(pattern, tail),
        b']' | b'}' => false,
        b'[' => match match_class(rest, first) {
            Some((true, after)) => match_bytes(after, tail),
            _ => false,
        },
        b'{' => match_alternatives(rest, candidate),
        b'\\' => match rest.split_first() {
            Some((&literal, after)) => literal == first && match_bytes(after, tail),
            None => false,
        },
        literal => literal == first && match_bytes(rest, tail),
    }
}

/// Test `c` against the class body that follows `[`.
///
/// Returns whether the class accepted `c` and the pattern after the closing
/// `]`, or `None` for an unterminated class.
fn match_class(class: &[u8], c: u8) -> Option<(bool, &[u8])> {
    let (negated, body) = match class.split_first() {
        Some((b'!', body)) => (true, body),
        _ => (false, class),
    };

    let close = body.iter().position(|&b| b == b']')?;
    let (members, after) = (&body[..close], &body[close + 1..]);

    let mut hit = false;
    let mut i = 0;
    while i < members.len() {
        match members.get(i + 1..i + 3) {
            Some(&[b'-', hi]) => {
                hit |= (members[i]..=hi).contains(&c);
                i += 3;
            }
            _ => {
                hit |= members[i] == c;
                i += 1;
            }
        }
    }

    Some((hit != negated, after))
}

/// Try each literal of the list that follows `{` as a prefix of `candidate`.
fn match_alternatives(list: &[u8], candidate: &[u8]) -> bool {
    let Some(close) = list.iter().position(|&b| b == b'}') else {
        return false;
    };
    let after = &list[close + 1..];

    list[..close].split(|&b| b == b',').any(|alternative| {
        candidate
            .strip_prefix(alternative)
            .is_some_and(|remaining| match_bytes(after, remaining))
    })
}
