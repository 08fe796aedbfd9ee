//! Mailbox address extraction.

/// Extracts the bare address from an address header value.
///
/// Accepts the usual shapes found in stored mail:
/// `Name <addr>`, `"Last, First" <addr>`, a bare `addr`, and `addr (Comment)`.
/// Only the first address of a list is returned. Returns `None` when no
/// address text remains.
///
/// # Example
///
/// ```
/// use mailcollect_mime::parse_address;
///
/// assert_eq!(parse_address("Alice <alice@example.com>").as_deref(), Some("alice@example.com"));
/// assert_eq!(parse_address("bob@example.com (Bob)").as_deref(), Some("bob@example.com"));
/// assert_eq!(parse_address("  "), None);
/// ```
#[must_use]
pub fn parse_address(value: &str) -> Option<String> {
    let uncommented = strip_comments(value);
    let first = first_mailbox(&uncommented);

    let addr = match angle_addr(first) {
        Some(inner) => inner,
        None => first,
    };

    let addr: String = addr.chars().filter(|c| !c.is_whitespace()).collect();
    let addr = addr.trim_matches('"');
    if addr.is_empty() { None } else { Some(addr.to_string()) }
}

/// Removes `( ... )` comments that are not inside a quoted string.
fn strip_comments(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0usize;
    let mut quoted = false;
    let mut escaped = false;

    for ch in value.chars() {
        if escaped {
            escaped = false;
            if depth == 0 {
                out.push(ch);
            }
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                if depth == 0 {
                    out.push(ch);
                }
            }
            '"' if depth == 0 => {
                quoted = !quoted;
                out.push(ch);
            }
            '(' if !quoted => depth += 1,
            ')' if !quoted && depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }

    out
}

/// Returns the text of the first mailbox in a comma separated list.
fn first_mailbox(value: &str) -> &str {
    let mut quoted = false;
    let mut angled = false;

    for (i, ch) in value.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '<' if !quoted => angled = true,
            '>' if !quoted => angled = false,
            ',' if !quoted && !angled => return &value[..i],
            _ => {}
        }
    }

    value
}

/// Returns the content of the `<...>` part of a mailbox, if any.
fn angle_addr(mailbox: &str) -> Option<&str> {
    let mut quoted = false;

    for (i, ch) in mailbox.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '<' if !quoted => {
                let rest = &mailbox[i + 1..];
                return Some(rest.find('>').map_or(rest, |end| &rest[..end]));
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_display_name() {
        assert_eq!(
            parse_address("Alice Example <alice@example.com>").as_deref(),
            Some("alice@example.com")
        );
    }

    #[test]
    fn test_parse_address_quoted_display_name() {
        assert_eq!(
            parse_address("\"Smith, John <boss>\" <john@example.com>").as_deref(),
            Some("john@example.com")
        );
    }

    #[test]
    fn test_parse_address_bare_and_comment() {
        assert_eq!(parse_address("a@x.com").as_deref(), Some("a@x.com"));
        assert_eq!(parse_address("a@x.com (Alice (home))").as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_parse_address_list_takes_first() {
        assert_eq!(
            parse_address("a@x.com, B <b@y.com>").as_deref(),
            Some("a@x.com")
        );
    }

    #[test]
    fn test_parse_address_keeps_case() {
        assert_eq!(parse_address("<Alice@Example.COM>").as_deref(), Some("Alice@Example.COM"));
    }

    #[test]
    fn test_parse_address_empty() {
        assert_eq!(parse_address(""), None);
        assert_eq!(parse_address("<>"), None);
        assert_eq!(parse_address("(only a comment)"), None);
    }
}
